//! Database bootstrap
//!
//! Opens the Postgres pool, applies migrations and refuses to start when the
//! indexes backing the one-active-booking and one-open-bill rules are missing.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Partial unique indexes the store relies on to reject racing writes
pub const GUARD_INDEXES: [&str; 2] = [
    "bookings_one_active_per_tenant",
    "payments_one_open_per_booking",
];

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Missing guard indexes: {}", .0.join(", "))]
    MissingIndexes(Vec<String>),
}

/// Connect, migrate and verify the schema
pub async fn connect(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(database = %config.database_url_masked(), "Connecting to database");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    run_migrations(&pool).await?;
    verify_guard_indexes(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Database migrations applied");
    Ok(())
}

/// Fail unless every index in [`GUARD_INDEXES`] exists
pub async fn verify_guard_indexes(pool: &PgPool) -> Result<(), DbError> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT indexname::text FROM pg_indexes WHERE indexname = ANY($1)")
            .bind(&GUARD_INDEXES[..])
            .fetch_all(pool)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    let missing = missing_indexes(&present);
    if !missing.is_empty() {
        return Err(DbError::MissingIndexes(missing));
    }
    Ok(())
}

fn missing_indexes(present: &[String]) -> Vec<String> {
    GUARD_INDEXES
        .iter()
        .filter(|name| !present.iter().any(|p| p == *name))
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_indexes() {
        let present = vec!["bookings_one_active_per_tenant".to_string()];
        assert_eq!(
            missing_indexes(&present),
            vec!["payments_one_open_per_booking".to_string()]
        );

        let all: Vec<String> = GUARD_INDEXES.iter().map(|s| s.to_string()).collect();
        assert!(missing_indexes(&all).is_empty());
    }

    #[test]
    fn test_missing_indexes_message_names_them() {
        let err = DbError::MissingIndexes(missing_indexes(&[]));
        let message = err.to_string();
        assert!(message.contains("bookings_one_active_per_tenant"));
        assert!(message.contains("payments_one_open_per_booking"));
    }
}
