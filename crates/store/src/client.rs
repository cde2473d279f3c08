//! SQLite pool wrapper.

use std::str::FromStr;
use std::time::Duration;

use engine_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::StoreConfig;

/// Handle to the analytics database.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Opens (creating if missing) the configured database and runs
    /// schema initialization.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(map_sqlx)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(map_sqlx)?;

        info!(url = %config.url, pool_size = config.max_connections, "Opened event store");

        let store = Self { pool };
        crate::schema::init_schema(&store).await?;
        Ok(store)
    }

    /// Opens an in-memory database for tests.
    ///
    /// A single connection keeps every caller on the same in-memory
    /// database instance.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(map_sqlx)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(map_sqlx)?;

        let store = Self { pool };
        crate::schema::init_schema(&store).await?;
        Ok(store)
    }

    /// Returns the inner pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps driver errors into the engine taxonomy.
///
/// Lock contention is the only error class worth retrying; everything
/// else is a persistence failure.
pub(crate) fn map_sqlx(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            if msg.contains("database is locked") || msg.contains("database table is locked") {
                Error::transient(msg.to_string())
            } else {
                Error::persistence(msg.to_string())
            }
        }
        sqlx::Error::PoolTimedOut => Error::transient("connection pool timed out"),
        _ => Error::persistence(err.to_string()),
    }
}
