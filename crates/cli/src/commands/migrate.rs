//! Database migration command.
//!
//! Migrations live in `crates/platform/migrations/` and are embedded in
//! the platform crate, so this binary carries them wherever it is copied.

use brewline_platform::db::MIGRATOR;

use super::connect;

/// Apply every pending migration.
///
/// # Errors
///
/// Returns an error if the connection or any migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;

    tracing::info!(
        available = MIGRATOR.iter().count(),
        "Running migrations..."
    );
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
