//! Customer address book.
//!
//! Each customer has at most one default address (enforced by a partial
//! unique index); the first address saved becomes the default, and deleting
//! the default promotes the most recently added remaining one.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use brewline_core::profile::{Address, AddressDraft};
use brewline_core::{AddressId, UserId};
use brewline_platform::db::RepositoryError;

const ADDRESS_COLUMNS: &str = "id, user_id, label, recipient_name, phone, street, city, \
    postal_code, notes, is_default";

pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Default first, then oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at, id"
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user)
            .fetch_all(self.pool)
            .await?;
        Ok(addresses)
    }

    /// An address owned by `user`; someone else's id reads as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2");
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(self.pool)
            .await?;
        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, draft), fields(user_id = %user))]
    pub async fn create(
        &self,
        user: UserId,
        draft: &AddressDraft,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM addresses WHERE user_id = $1")
            .bind(user)
            .fetch_one(&mut *tx)
            .await?;
        let is_default = draft.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, user).await?;
        }

        let sql = format!(
            r"
            INSERT INTO addresses
                (user_id, label, recipient_name, phone, street, city, postal_code, notes, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ADDRESS_COLUMNS}
            "
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(user)
            .bind(&draft.label)
            .bind(&draft.recipient_name)
            .bind(draft.phone.as_str())
            .bind(&draft.street)
            .bind(&draft.city)
            .bind(draft.postal_code.as_deref())
            .bind(draft.notes.as_deref())
            .bind(is_default)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Update an address. Unticking "default" on the current default is
    /// ignored; pick another address as default instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the
    /// customer's, or `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, draft), fields(user_id = %user, address_id = %id))]
    pub async fn update(
        &self,
        user: UserId,
        id: AddressId,
        draft: &AddressDraft,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: bool = sqlx::query_scalar(
            "SELECT is_default FROM addresses WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let is_default = was_default || draft.is_default;
        if is_default && !was_default {
            clear_default(&mut tx, user).await?;
        }

        let sql = format!(
            r"
            UPDATE addresses SET
                label = $3, recipient_name = $4, phone = $5, street = $6, city = $7,
                postal_code = $8, notes = $9, is_default = $10, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(user)
            .bind(&draft.label)
            .bind(&draft.recipient_name)
            .bind(draft.phone.as_str())
            .bind(&draft.street)
            .bind(&draft.city)
            .bind(draft.postal_code.as_deref())
            .bind(draft.notes.as_deref())
            .bind(is_default)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the
    /// customer's, or `RepositoryError::Database` if a query fails.
    #[instrument(skip(self), fields(user_id = %user, address_id = %id))]
    pub async fn delete(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE addresses SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM addresses WHERE user_id = $1
                    ORDER BY created_at DESC, id DESC LIMIT 1
                )
                ",
            )
            .bind(user)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the
    /// customer's, or `RepositoryError::Database` if a query fails.
    #[instrument(skip(self), fields(user_id = %user, address_id = %id))]
    pub async fn set_default(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut tx, user).await?;

        let updated = sqlx::query(
            "UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls back the cleared default.
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    user: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
        .bind(user)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
