//! Durable session backup for the session keeper.
//!
//! This crate provides:
//! - Async SQLite executor with a dedicated thread
//! - Schema migrations
//! - The [`BackupStore`] trait with SQLite and in-memory implementations
//!
//! ```ignore
//! let store = SqliteBackupStore::new(paths.backup_database_file(), clock, BackupPolicy::default());
//! store.save(&session).await;
//! let record = store.load().await;
//! ```

mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;
mod store;

pub use error::{BackupError, BackupResult};
pub use executor::AsyncDatabase;
pub use migrations::run_migrations;
pub use models::{BackupRecord, CURRENT_SESSION_KEY};
pub use store::{BackupPolicy, BackupStore, MemoryBackupStore, SqliteBackupStore};
