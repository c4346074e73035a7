//! Shelfroom storage layer.
//!
//! Two stores back the application:
//!
//! - [`PresenceStore`] — ephemeral keys with connection-scoped disconnect
//!   hooks; holds lock records.
//! - [`DocumentStore`] — durable documents with partial merges and
//!   conditional transactions; holds rooms, shelves, items and room state.
//!
//! The [`repositories`] map domain types onto document paths.

use sqlx::postgres::PgPoolOptions;

pub mod documents;
pub mod models;
pub mod paths;
pub mod pg;
pub mod presence;
pub mod repositories;
pub mod tx;

pub use documents::{Document, DocumentError, DocumentStore, MemoryDocumentStore};
pub use pg::PgDocumentStore;
pub use presence::{
    ConnectionId, DisconnectGuard, MemoryPresenceStore, PresenceError, PresenceStore,
};
pub use tx::{TxDecision, TxOutcome};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
