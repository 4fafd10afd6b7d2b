//! SQLite connection management.
//!
//! WAL journal mode is enabled so concurrent searches and ingestions do
//! not block each other; single-row updates (status transitions, history
//! increments) serialize inside SQLite itself. The database file and its
//! parent directories are created on first connect.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::StorageConfig;

/// Connection pool to the configured database file.
pub async fn connect(storage: &StorageConfig) -> Result<SqlitePool> {
    if let Some(parent) = storage.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", storage.db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    tracing::debug!(path = %storage.db_path.display(), "connected to database");

    Ok(pool)
}

/// Single-connection in-memory pool for tests.
pub async fn connect_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}
