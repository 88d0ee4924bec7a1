//! Database Module
//!
//! PostgreSQL connection pool, migrations, transaction management and the
//! outbox tables.

mod message_store;
mod outbox_store;
pub mod unit_of_work;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseSettings;

pub use message_store::PgSystemMessageStore;
pub use outbox_store::PgOutboxStore;
pub use unit_of_work::{PgUnitOfWork, TransactionContext};

/// Create a PostgreSQL connection pool
pub async fn create_pool(settings: &DatabaseSettings, url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(url)
        .await?;
    info!(max_connections = settings.max_connections, "Database pool ready");
    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
