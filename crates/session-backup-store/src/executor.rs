//! Async SQLite executor using a dedicated background thread.
//!
//! Queries are sent through a channel to a single SQLite thread and run in
//! FIFO order. Only SQL and lightweight row mapping belong inside `call()`.
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let record = db.call(move |conn| queries::load_fresh(conn, now_ms, retention_ms)).await?;
//! ```

use crate::{migrations, BackupError, BackupResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::info;

/// Convert a tokio_rusqlite::Error to BackupError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> BackupError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => BackupError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => BackupError::Connection("Connection closed".to_string()),
        other => BackupError::Connection(other.to_string()),
    }
}

/// Async SQLite database with a dedicated executor thread.
#[derive(Clone)]
pub struct AsyncDatabase {
    conn: Connection,
    path: String,
}

impl AsyncDatabase {
    /// Open a database at the given path.
    ///
    /// Creates the parent directory and file if needed, enables WAL mode and
    /// runs pending migrations.
    pub async fn open(path: &Path) -> BackupResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();

        info!(path = %path_str, "Opening backup database");

        let conn = Connection::open(&path_str)
            .await
            .map_err(|e| BackupError::Connection(e.to_string()))?;

        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA temp_store = MEMORY;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        conn.call(|conn| {
            migrations::run_migrations(conn)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        info!(path = %path_str, "Backup database initialized with WAL mode");

        Ok(Self {
            conn,
            path: path_str,
        })
    }

    /// Execute a closure on the database connection.
    ///
    /// The closure runs on the dedicated SQLite thread; the caller's task is
    /// parked until the result is ready.
    pub async fn call<F, T>(&self, f: F) -> BackupResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> BackupResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let outer_result = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer_result {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Execute a closure that returns a rusqlite::Result.
    pub async fn call_sqlite<F, T>(&self, f: F) -> BackupResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Get the database file path.
    pub fn path(&self) -> &str {
        &self.path
    }
}
