//! Backup store error types.

use thiserror::Error;

/// Backup store error type.
///
/// These never cross the [`crate::BackupStore`] boundary; they are logged and
/// swallowed there.
#[derive(Error, Debug)]
pub enum BackupError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Executor connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using BackupError.
pub type BackupResult<T> = Result<T, BackupError>;
