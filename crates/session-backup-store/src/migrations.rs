//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::{BackupError, BackupResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> BackupResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version > CURRENT_VERSION {
        return Err(BackupError::Migration(format!(
            "schema version {} is newer than supported version {}",
            current_version, CURRENT_VERSION
        )));
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_session_backup(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> BackupResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: single-row session backup table.
fn migrate_v1_session_backup(conn: &Connection) -> BackupResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS session_backup (
            key TEXT PRIMARY KEY NOT NULL,
            access_token TEXT NOT NULL,
            refresh_token TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            user_id TEXT NOT NULL,
            email TEXT,
            saved_at INTEGER NOT NULL
        );
        ",
    )?;
    record_migration(conn, 1, "session_backup")
}
