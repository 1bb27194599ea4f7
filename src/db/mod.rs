//! SQLite-backed persistence for conversation history

pub mod history;
mod schema;

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use history::{HistoryRepo, Turn, TurnRole};
pub use schema::SCHEMA_VERSION;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Open (or create) the on-disk database and run migrations
///
/// # Errors
///
/// Returns `Error::Database` if the pool cannot be built or migration
/// fails
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let pool = build_pool(SqliteConnectionManager::file(path), 4)?;
    tracing::info!(version = SCHEMA_VERSION, "database ready");
    Ok(pool)
}

/// In-memory database for tests; one connection keeps the data alive
///
/// # Errors
///
/// Returns `Error::Database` if initialization fails
pub fn init_memory() -> Result<DbPool> {
    build_pool(SqliteConnectionManager::memory(), 1)
}

fn build_pool(manager: SqliteConnectionManager, size: u32) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(size)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    Ok(pool)
}
