//! SQLite connection management

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Storage-layer failures. Always propagated to the caller, never swallowed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("Query error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored value is outside its valid range
    #[error("Corrupt {table} row: {detail}")]
    Corrupt {
        table: &'static str,
        detail: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS api_keys (
    key TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    rate_limit_per_minute INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS usage_counters (
    key TEXT PRIMARY KEY REFERENCES api_keys(key),
    total_requests INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rate_limit_windows (
    key TEXT PRIMARY KEY REFERENCES api_keys(key),
    window_start_ms INTEGER NOT NULL,
    request_count INTEGER NOT NULL
);
"#;

/// Shared handle to the SQLite database.
///
/// A rusqlite `Connection` is `Send` but not `Sync`, so the single connection
/// sits behind a mutex. Every call runs on the blocking thread pool.
#[derive(Clone)]
pub struct DbPool {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl DbPool {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path).map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;

        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;

        let pool = Self::init(conn, path)?;

        info!(
            path = %pool.path.display(),
            journal_mode = %journal_mode,
            "Database opened"
        );

        Ok(pool)
    }

    /// Open a private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;

        Ok(DbPool {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Run `f` with exclusive access to the connection on the blocking pool
    pub async fn run<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await?
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> Result<(), StorageError> {
        self.run(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}
