//! Profiles attached to platform auth users.

use sqlx::PgPool;
use tracing::instrument;

use brewline_core::profile::{Profile, ProfileUpdate};
use brewline_core::{Email, ProfileRole, UserId};

use super::RepositoryError;

const PROFILE_COLUMNS: &str = "id, full_name, email, phone, role, avatar_url, created_at";

pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create the profile on first sign-in, or refresh the email on later
    /// ones. A name the customer already edited is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    #[instrument(skip(self, email, full_name, avatar_url), fields(user_id = %id))]
    pub async fn ensure(
        &self,
        id: UserId,
        email: Option<&str>,
        full_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<Profile, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO profiles (id, email, full_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, profiles.email),
                full_name = CASE WHEN profiles.full_name = '' THEN EXCLUDED.full_name
                                 ELSE profiles.full_name END,
                avatar_url = COALESCE(profiles.avatar_url, EXCLUDED.avatar_url),
                updated_at = NOW()
            RETURNING {PROFILE_COLUMNS}
            "
        );
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(email)
            .bind(full_name.trim())
            .bind(avatar_url)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "an account with this email"))?;
        Ok(profile)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(profile)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE LOWER(email) = $1");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(email.as_str())
            .fetch_optional(self.pool)
            .await?;
        Ok(profile)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn update(&self, id: UserId, update: &ProfileUpdate) -> Result<Profile, RepositoryError> {
        let sql = format!(
            r"
            UPDATE profiles SET full_name = $2, phone = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(&update.full_name)
            .bind(update.phone.as_ref().map(|p| p.as_str().to_owned()))
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    #[instrument(skip(self), fields(user_id = %id, role = %role))]
    pub async fn set_role(&self, id: UserId, role: ProfileRole) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
