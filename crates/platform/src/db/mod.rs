//! Postgres access shared by both binaries.
//!
//! # Tables (public schema)
//!
//! - `profiles`, `addresses` - accounts keyed by the platform auth user id
//! - `categories`, `products`, `option_groups`, `option_items`,
//!   `product_option_groups`, `promos` - the catalog
//! - `orders`, `order_items` - placed orders with option snapshots
//! - `store_settings` - JSONB key/value settings
//!
//! Session tables live in the `storefront` and `admin` schemas.
//!
//! # Migrations
//!
//! Stored in `crates/platform/migrations/` and run via:
//! ```bash
//! cargo run -p brewline-cli -- migrate
//! ```

pub mod orders;
pub mod profiles;
pub mod settings;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use brewline_core::TransitionError;

pub use orders::OrderRepository;
pub use profiles::ProfileRepository;
pub use settings::SettingsRepository;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row could not be mapped to a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("not found")]
    NotFound,

    /// Unique violation, or a row changed underneath an optimistic update.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Not enough stock for the named product.
    #[error("{0} is out of stock")]
    OutOfStock(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, leaving other
    /// errors as `Database`.
    #[must_use]
    pub fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a Postgres pool (10 max / 2 min connections).
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
