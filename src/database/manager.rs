use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Bundled schema, applied by `brandhub migrate`.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_brandhub.sql");

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds and checks the Postgres connection pool
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a pool against `DATABASE_URL` using the configured limits
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config.url.as_deref().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let database = Self::database_name(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool for: {}", database);
        Ok(pool)
    }

    /// Database name from the URL path, for logs that must not leak credentials
    fn database_name(url: &str) -> Result<String, DatabaseError> {
        let parsed = url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }
        let name = parsed.path().trim_start_matches('/');
        if name.is_empty() {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }
        Ok(name.to_string())
    }

    /// Apply the bundled schema. Every statement is idempotent.
    pub async fn apply_schema(pool: &PgPool) -> Result<(), DatabaseError> {
        pool.execute(SCHEMA_SQL)
            .await
            .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;
        info!("Applied BrandHub schema");
        Ok(())
    }
}
