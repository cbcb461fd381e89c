//! Query functions over the `session_backup` table.
//!
//! Each function takes a `&Connection` as its first parameter so it can run
//! inside [`crate::AsyncDatabase::call`].

use crate::models::CURRENT_SESSION_KEY;
use crate::{BackupRecord, BackupResult};
use chrono::Duration;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// Insert or replace the current record.
pub fn upsert_current(conn: &Connection, record: &BackupRecord) -> BackupResult<()> {
    conn.execute(
        "INSERT INTO session_backup (key, access_token, refresh_token, expires_at, user_id, email, saved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(key) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            expires_at = excluded.expires_at,
            user_id = excluded.user_id,
            email = excluded.email,
            saved_at = excluded.saved_at",
        params![
            CURRENT_SESSION_KEY,
            record.access_token,
            record.refresh_token,
            record.expires_at,
            record.user_id,
            record.email,
            record.saved_at,
        ],
    )?;
    Ok(())
}

/// Get the current record regardless of staleness.
pub fn get_current(conn: &Connection) -> BackupResult<Option<BackupRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT access_token, refresh_token, expires_at, user_id, email, saved_at
         FROM session_backup WHERE key = ?1",
    )?;

    let record = stmt
        .query_row(params![CURRENT_SESSION_KEY], |row| {
            Ok(BackupRecord {
                access_token: row.get(0)?,
                refresh_token: row.get(1)?,
                expires_at: row.get(2)?,
                user_id: row.get(3)?,
                email: row.get(4)?,
                saved_at: row.get(5)?,
            })
        })
        .optional()?;
    Ok(record)
}

/// Delete the current record. Returns whether a row was removed.
pub fn delete_current(conn: &Connection) -> BackupResult<bool> {
    let removed = conn.execute(
        "DELETE FROM session_backup WHERE key = ?1",
        params![CURRENT_SESSION_KEY],
    )?;
    Ok(removed > 0)
}

/// Read the current record, deleting and hiding it when stale.
pub fn load_fresh(
    conn: &Connection,
    now_millis: i64,
    retention: Duration,
) -> BackupResult<Option<BackupRecord>> {
    match get_current(conn)? {
        Some(record) if record.is_stale(now_millis, retention) => {
            debug!(
                expires_at = record.expires_at,
                saved_at = record.saved_at,
                "Evicting stale session backup"
            );
            delete_current(conn)?;
            Ok(None)
        }
        other => Ok(other),
    }
}
