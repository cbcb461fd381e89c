//! The durable backup store.

use crate::{queries, AsyncDatabase, BackupRecord, BackupResult};
use async_trait::async_trait;
use chrono::Duration;
use keeper_config_and_utils::{Clock, Session};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// How long a backup stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupPolicy {
    /// Records written longer ago than this are evicted on read.
    pub retention: Duration,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            retention: Duration::days(30),
        }
    }
}

/// Secondary copy of the session that outlives the primary tier.
///
/// None of the operations fail: storage errors are logged and the call
/// behaves as if nothing was stored.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Replace the stored record with `session`, stamped with the current time.
    async fn save(&self, session: &Session);

    /// The stored record, or `None` if absent or stale. Stale records are
    /// deleted by the read that detects them.
    async fn load(&self) -> Option<BackupRecord>;

    /// Remove the stored record. Idempotent.
    async fn clear(&self);
}

/// SQLite-backed store. The database is opened on first use.
pub struct SqliteBackupStore {
    path: PathBuf,
    db: OnceCell<AsyncDatabase>,
    clock: Arc<dyn Clock>,
    policy: BackupPolicy,
    #[cfg(test)]
    opens: std::sync::atomic::AtomicUsize,
}

impl SqliteBackupStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>, policy: BackupPolicy) -> Self {
        Self {
            path: path.into(),
            db: OnceCell::new(),
            clock,
            policy,
            #[cfg(test)]
            opens: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Concurrent first callers share one open. A failed open leaves the
    /// cell empty so the next call retries.
    async fn db(&self) -> BackupResult<&AsyncDatabase> {
        self.db
            .get_or_try_init(|| async {
                #[cfg(test)]
                self.opens
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                AsyncDatabase::open(&self.path).await
            })
            .await
    }

    async fn try_save(&self, record: BackupRecord) -> BackupResult<()> {
        let db = self.db().await?;
        db.call(move |conn| queries::upsert_current(conn, &record))
            .await
    }

    async fn try_load(&self) -> BackupResult<Option<BackupRecord>> {
        let db = self.db().await?;
        let now_millis = self.clock.now_millis();
        let retention = self.policy.retention;
        db.call(move |conn| queries::load_fresh(conn, now_millis, retention))
            .await
    }

    async fn try_clear(&self) -> BackupResult<bool> {
        let db = self.db().await?;
        db.call(queries::delete_current).await
    }
}

#[async_trait]
impl BackupStore for SqliteBackupStore {
    async fn save(&self, session: &Session) {
        if !session.has_token_pair() {
            warn!(user_id = %session.user_id, "Refusing to back up session without a token pair");
            return;
        }
        let record = BackupRecord::from_session(session, self.clock.now_millis());
        match self.try_save(record).await {
            Ok(()) => debug!(user_id = %session.user_id, "Session backup saved"),
            Err(e) => warn!(error = %e, "Failed to save session backup"),
        }
    }

    async fn load(&self) -> Option<BackupRecord> {
        match self.try_load().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Failed to load session backup");
                None
            }
        }
    }

    async fn clear(&self) {
        match self.try_clear().await {
            Ok(removed) => debug!(removed, "Session backup cleared"),
            Err(e) => warn!(error = %e, "Failed to clear session backup"),
        }
    }
}

/// Process-local store with the same contract as [`SqliteBackupStore`].
pub struct MemoryBackupStore {
    slot: Mutex<Option<BackupRecord>>,
    clock: Arc<dyn Clock>,
    policy: BackupPolicy,
}

impl MemoryBackupStore {
    pub fn new(clock: Arc<dyn Clock>, policy: BackupPolicy) -> Self {
        Self {
            slot: Mutex::new(None),
            clock,
            policy,
        }
    }
}

#[async_trait]
impl BackupStore for MemoryBackupStore {
    async fn save(&self, session: &Session) {
        if !session.has_token_pair() {
            warn!(user_id = %session.user_id, "Refusing to back up session without a token pair");
            return;
        }
        let record = BackupRecord::from_session(session, self.clock.now_millis());
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(record);
    }

    async fn load(&self) -> Option<BackupRecord> {
        let now_millis = self.clock.now_millis();
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot
            .as_ref()
            .is_some_and(|r| r.is_stale(now_millis, self.policy.retention))
        {
            debug!("Evicting stale session backup");
            *slot = None;
        }
        slot.clone()
    }

    async fn clear(&self) {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeper_config_and_utils::ManualClock;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn session_expiring_in(clock: &ManualClock, secs: i64) -> Session {
        Session::new("access-1", "refresh-1", clock.now_secs() + secs, "user-1")
    }

    fn sqlite_store(path: PathBuf, clock: Arc<ManualClock>) -> SqliteBackupStore {
        SqliteBackupStore::new(path, clock, BackupPolicy::default())
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = sqlite_store(dir.path().join("backup.sqlite"), clock.clone());

        assert!(store.load().await.is_none());

        let session = session_expiring_in(&clock, 3600);
        store.save(&session).await;

        let record = store.load().await.unwrap();
        assert_eq!(record.to_session(), session);
        assert_eq!(record.saved_at, clock.now_millis());
    }

    #[tokio::test]
    async fn test_save_overwrites_and_restamps() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = sqlite_store(dir.path().join("backup.sqlite"), clock.clone());

        store.save(&session_expiring_in(&clock, 3600)).await;
        clock.advance(Duration::seconds(10));
        let second = Session::new("access-2", "refresh-2", clock.now_secs() + 3600, "user-1");
        store.save(&second).await;

        let record = store.load().await.unwrap();
        assert_eq!(record.access_token, "access-2");
        assert_eq!(record.saved_at, clock.now_millis());
    }

    #[tokio::test]
    async fn test_expired_record_is_evicted() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = sqlite_store(dir.path().join("backup.sqlite"), clock.clone());

        store.save(&session_expiring_in(&clock, 60)).await;
        clock.advance(Duration::seconds(61));

        assert!(store.load().await.is_none());
        // Rewinding shows the row is gone, not just hidden.
        clock.advance(Duration::seconds(-61));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_record_older_than_retention_is_evicted() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = sqlite_store(dir.path().join("backup.sqlite"), clock.clone());

        store
            .save(&session_expiring_in(&clock, 86_400 * 365))
            .await;
        clock.advance(Duration::days(31));

        assert!(store.load().await.is_none());
        clock.advance(Duration::days(-31));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = sqlite_store(dir.path().join("backup.sqlite"), clock.clone());

        store.clear().await;
        store.save(&session_expiring_in(&clock, 3600)).await;
        store.clear().await;
        store.clear().await;
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_refuses_session_without_token_pair() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = sqlite_store(dir.path().join("backup.sqlite"), clock.clone());

        store
            .save(&Session::new("access-only", "", clock.now_secs() + 3600, "user-1"))
            .await;
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_first_use_opens_once() {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(sqlite_store(dir.path().join("backup.sqlite"), clock));

        let mut handles = vec![];
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.load().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_none());
        }

        assert_eq!(store.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.sqlite");
        let clock = Arc::new(ManualClock::starting_now());

        let session = session_expiring_in(&clock, 3600);
        sqlite_store(path.clone(), clock.clone()).save(&session).await;

        let reopened = sqlite_store(path, clock);
        assert_eq!(reopened.load().await.unwrap().to_session(), session);
    }

    #[tokio::test]
    async fn test_unusable_location_degrades_to_absent() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let store = sqlite_store(blocker.join("backup.sqlite"), clock.clone());

        store.save(&session_expiring_in(&clock, 3600)).await;
        assert!(store.load().await.is_none());
        store.clear().await;

        // Each call retried the open.
        assert_eq!(store.opens.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryBackupStore::new(clock.clone(), BackupPolicy::default());

        let session = session_expiring_in(&clock, 120);
        store.save(&session).await;
        assert_eq!(store.load().await.unwrap().to_session(), session);

        clock.advance(Duration::seconds(121));
        assert!(store.load().await.is_none());

        clock.advance(Duration::seconds(-121));
        assert!(store.load().await.is_none());

        store.save(&session).await;
        store.clear().await;
        store.clear().await;
        assert!(store.load().await.is_none());
    }
}
