//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresOutboxStore` - Outbox table with `SKIP LOCKED` batch claims
//! - `run_migrations` - Applies the embedded schema migrations

mod outbox_store;

pub use outbox_store::PostgresOutboxStore;

use sqlx::migrate::MigrateError;
use sqlx::PgPool;

/// Applies every pending migration from `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
