//! Promo banner writes.

use sqlx::PgPool;
use tracing::{info, instrument};

use brewline_core::PromoId;
use brewline_core::promo::{Promo, PromoDraft};

use super::{ImageChange, RepositoryError};

const PROMO_COLUMNS: &str = "id, title, subtitle, image_url, product_id, is_active, sort_order, \
    starts_at, ends_at, created_at";

/// Promo row with the linked product's name for the list page.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromoListing {
    #[sqlx(flatten)]
    pub promo: Promo,
    pub product_name: Option<String>,
}

pub struct PromoRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PromoRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<PromoListing>, RepositoryError> {
        let rows = sqlx::query_as::<_, PromoListing>(
            r"
            SELECT b.id, b.title, b.subtitle, b.image_url, b.product_id, b.is_active,
                   b.sort_order, b.starts_at, b.ends_at, b.created_at,
                   p.name AS product_name
            FROM promos b
            LEFT JOIN products p ON p.id = b.product_id
            ORDER BY b.sort_order, b.created_at DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such promo exists.
    pub async fn get(&self, id: PromoId) -> Result<Promo, RepositoryError> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promos WHERE id = $1");
        sqlx::query_as::<_, Promo>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, draft, image_url), fields(title = %draft.title))]
    pub async fn create(
        &self,
        draft: &PromoDraft,
        image_url: Option<&str>,
    ) -> Result<Promo, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO promos (title, subtitle, image_url, product_id, is_active, sort_order,
                                starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROMO_COLUMNS}
            "
        );
        let promo = sqlx::query_as::<_, Promo>(&sql)
            .bind(draft.title.trim())
            .bind(draft.subtitle.as_deref())
            .bind(image_url)
            .bind(draft.product_id)
            .bind(draft.is_active)
            .bind(draft.sort_order)
            .bind(draft.starts_at)
            .bind(draft.ends_at)
            .fetch_one(self.pool)
            .await?;
        info!(promo_id = %promo.id, "Promo created");
        Ok(promo)
    }

    /// Returns the stored promo and the image URL it had before.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such promo exists.
    #[instrument(skip(self, draft, image), fields(promo_id = %id))]
    pub async fn update(
        &self,
        id: PromoId,
        draft: &PromoDraft,
        image: &ImageChange,
    ) -> Result<(Promo, Option<String>), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let previous: Option<String> =
            sqlx::query_scalar("SELECT image_url FROM promos WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        let sql = format!(
            r"
            UPDATE promos
            SET title = $2, subtitle = $3, image_url = $4, product_id = $5, is_active = $6,
                sort_order = $7, starts_at = $8, ends_at = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROMO_COLUMNS}
            "
        );
        let promo = sqlx::query_as::<_, Promo>(&sql)
            .bind(id)
            .bind(draft.title.trim())
            .bind(draft.subtitle.as_deref())
            .bind(image.apply(previous.clone()))
            .bind(draft.product_id)
            .bind(draft.is_active)
            .bind(draft.sort_order)
            .bind(draft.starts_at)
            .bind(draft.ends_at)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok((promo, previous))
    }

    /// Returns the image URL so the caller can remove it from storage.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such promo exists.
    #[instrument(skip(self), fields(promo_id = %id))]
    pub async fn delete(&self, id: PromoId) -> Result<Option<String>, RepositoryError> {
        let image_url: Option<String> =
            sqlx::query_scalar("DELETE FROM promos WHERE id = $1 RETURNING image_url")
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or(RepositoryError::NotFound)?;
        Ok(image_url)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such promo exists.
    #[instrument(skip(self), fields(promo_id = %id))]
    pub async fn toggle_active(&self, id: PromoId) -> Result<Promo, RepositoryError> {
        let sql = format!(
            r"
            UPDATE promos SET is_active = NOT is_active, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROMO_COLUMNS}
            "
        );
        sqlx::query_as::<_, Promo>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
