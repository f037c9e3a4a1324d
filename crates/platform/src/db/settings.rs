//! Store settings persisted as JSONB documents.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use brewline_core::settings::StoreSettings;

use super::RepositoryError;

const STORE_KEY: &str = "store";

pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails or
    /// `RepositoryError::DataCorruption` if the stored JSON does not fit `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RepositoryError> {
        let value: Option<JsonValue> =
            sqlx::query_scalar("SELECT value FROM store_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool)
                .await?;
        value
            .map(|v| {
                serde_json::from_value(v).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid setting '{key}': {e}"))
                })
            })
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), RepositoryError> {
        let json = serde_json::to_value(value)
            .map_err(|e| RepositoryError::DataCorruption(format!("unserializable setting: {e}")))?;
        sqlx::query(
            r"
            INSERT INTO store_settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(json)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Store settings, or defaults when none were saved yet.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    pub async fn store(&self) -> Result<StoreSettings, RepositoryError> {
        Ok(self.get(STORE_KEY).await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// See [`Self::set`].
    pub async fn save_store(&self, settings: &StoreSettings) -> Result<(), RepositoryError> {
        self.set(STORE_KEY, settings).await
    }
}
