//! Postgres persistence for the cropwatch alerting service.
//!
//! Write-side repositories rehydrate aggregates from state rows; the unit
//! of work persists staged aggregates and drains their domain events into
//! the `outbox_events` table inside one transaction.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod read_store;
pub mod repositories;
pub mod unit_of_work;

pub use read_store::{AlertReadStore, OverallStatus, PendingSummary, ScopeStatus};
pub use repositories::{
    AlertProjectionRepo, OutboxRepo, PgAlertRepository, PgSensorReadingRepository,
};
pub use unit_of_work::PgUnitOfWorkFactory;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
