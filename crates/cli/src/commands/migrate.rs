//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! qr-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `MARKETPLACE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Marketplace migrations: `crates/marketplace/migrations/`

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

/// Errors from migration commands.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Resolve the marketplace database URL from the environment.
pub(crate) fn database_url() -> Result<SecretString, MigrationError> {
    dotenvy::dotenv().ok();

    std::env::var("MARKETPLACE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("MARKETPLACE_DATABASE_URL"))
}

/// Run marketplace database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails or a
/// migration fails.
pub async fn marketplace() -> Result<(), MigrationError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to marketplace database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running marketplace migrations...");
    sqlx::migrate!("../marketplace/migrations").run(&pool).await?;

    tracing::info!("Marketplace migrations complete!");
    Ok(())
}
