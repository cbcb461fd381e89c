#![allow(dead_code)]

use async_trait::async_trait;
use keeper_config_and_utils::{Clock, ManualClock, Session};
use session_backup_store::{BackupPolicy, BackupRecord, BackupStore, MemoryBackupStore};
use session_keeper::{
    AuthError, AuthEvent, AuthEventEmitter, AuthResult, AuthStateListener, PrimarySessionHandle,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How [`FakeHandle::establish`] responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstablishBehavior {
    /// Adopt the pair and emit SignedIn.
    Accept,
    /// Fail with SessionInvalid.
    Reject,
    /// Never resolve.
    Hang,
    /// Write the pair to the primary tier, then never resolve.
    AdoptThenHang,
    /// Panic inside the call.
    Panic,
}

/// In-memory primary session handle that counts every call.
pub struct FakeHandle {
    clock: Arc<ManualClock>,
    current: Mutex<Option<Session>>,
    behavior: Mutex<EstablishBehavior>,
    call_delay: Duration,
    events: AuthEventEmitter,
    pub get_current_calls: AtomicUsize,
    pub establish_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub established_with: Mutex<Vec<(String, String)>>,
}

impl FakeHandle {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            current: Mutex::new(None),
            behavior: Mutex::new(EstablishBehavior::Accept),
            call_delay: Duration::from_millis(20),
            events: AuthEventEmitter::new(),
            get_current_calls: AtomicUsize::new(0),
            establish_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            established_with: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: EstablishBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Seed the primary tier without emitting anything.
    pub fn set_current(&self, session: Option<Session>) {
        *self.current.lock().unwrap() = session;
    }

    pub fn current(&self) -> Option<Session> {
        self.current.lock().unwrap().clone()
    }

    pub async fn sign_in(&self, session: Session) {
        self.set_current(Some(session.clone()));
        self.events.emit(AuthEvent::signed_in(session)).await;
    }

    pub async fn token_refreshed(&self, session: Session) {
        self.set_current(Some(session.clone()));
        self.events.emit(AuthEvent::token_refreshed(session)).await;
    }

    pub async fn sign_out(&self) {
        self.set_current(None);
        self.events.emit(AuthEvent::signed_out()).await;
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrimarySessionHandle for FakeHandle {
    async fn get_current(&self) -> AuthResult<Option<Session>> {
        self.get_current_calls.fetch_add(1, Ordering::SeqCst);
        // Yield long enough for concurrent callers to pile up.
        tokio::time::sleep(self.call_delay).await;
        Ok(self.current())
    }

    async fn establish(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session> {
        self.establish_calls.fetch_add(1, Ordering::SeqCst);
        self.established_with
            .lock()
            .unwrap()
            .push((access_token.to_string(), refresh_token.to_string()));
        tokio::time::sleep(self.call_delay).await;

        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            EstablishBehavior::Accept => {
                let session = Session::new(
                    access_token,
                    refresh_token,
                    self.clock.now_secs() + 3600,
                    "user-1",
                );
                self.sign_in(session.clone()).await;
                Ok(session)
            }
            EstablishBehavior::Reject => {
                Err(AuthError::SessionInvalid("refresh token revoked".to_string()))
            }
            EstablishBehavior::Hang => std::future::pending().await,
            EstablishBehavior::AdoptThenHang => {
                self.set_current(Some(Session::new(
                    access_token,
                    refresh_token,
                    self.clock.now_secs() + 3600,
                    "user-1",
                )));
                std::future::pending().await
            }
            EstablishBehavior::Panic => panic!("establish blew up"),
        }
    }

    fn subscribe(&self, listener: Arc<dyn AuthStateListener>) {
        self.events.subscribe(listener);
    }

    async fn refresh_if_needed(&self) -> AuthResult<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Backup store wrapper that counts calls.
pub struct CountingBackup {
    inner: MemoryBackupStore,
    pub saves: AtomicUsize,
    pub loads: AtomicUsize,
    pub clears: AtomicUsize,
}

impl CountingBackup {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            inner: MemoryBackupStore::new(clock, BackupPolicy::default()),
            saves: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BackupStore for CountingBackup {
    async fn save(&self, session: &Session) {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(session).await;
    }

    async fn load(&self) -> Option<BackupRecord> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load().await
    }

    async fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await;
    }
}

/// A session whose access token expires `secs` from the clock's now.
pub fn session_expiring_in(clock: &ManualClock, access: &str, refresh: &str, secs: i64) -> Session {
    Session::new(access, refresh, clock.now_secs() + secs, "user-1")
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::starting_now())
}

/// A keeper wired to a [`FakeHandle`] and a [`CountingBackup`].
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub handle: Arc<FakeHandle>,
    pub backup: Arc<CountingBackup>,
    pub keeper: session_keeper::SessionKeeper,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(session_keeper::KeeperOptions::default())
    }

    pub fn with_options(options: session_keeper::KeeperOptions) -> Self {
        let clock = clock();
        let handle = Arc::new(FakeHandle::new(clock.clone()));
        let backup = Arc::new(CountingBackup::new(clock.clone()));
        let keeper = session_keeper::SessionKeeper::new(
            handle.clone(),
            backup.clone(),
            clock.clone(),
            options,
        );
        Self {
            clock,
            handle,
            backup,
            keeper,
        }
    }

    /// Put a record in the backup tier without going through the handle.
    pub async fn seed_backup(&self, access: &str, refresh: &str) {
        let session = session_expiring_in(&self.clock, access, refresh, 3600);
        self.backup.save(&session).await;
        self.backup.saves.store(0, Ordering::SeqCst);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
