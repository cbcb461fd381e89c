//! Single-flight session restoration.
//!
//! [`RestorationCoordinator::restore`] recovers a session from the backup
//! store when the primary tier has none. However many callers ask, the
//! sequence runs at most once per [`RestorationState`] and every caller
//! observes the same outcome.

use crate::restoration_fsm::{RestorationInput, RestorationMachine, RestorationPhase};
use crate::{AuthError, AuthResult, PrimarySessionHandle};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use keeper_config_and_utils::Session;
use session_backup_store::BackupStore;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Callback fired once with the restoration outcome.
pub type CompletionListener = Box<dyn FnOnce(bool) + Send + 'static>;

pub(crate) type SharedOutcome = Shared<BoxFuture<'static, bool>>;

struct Inner {
    machine: RestorationMachine,
    shared_outcome: Option<SharedOutcome>,
    success: bool,
    pending_listeners: Vec<CompletionListener>,
}

/// Process-wide restoration progress.
///
/// Create one and share it (`Arc`) between the coordinator and the notifier.
/// Only the coordinator moves the state machine or assigns the shared
/// outcome; everyone else reads or appends listeners.
pub struct RestorationState {
    inner: Mutex<Inner>,
}

impl Default for RestorationState {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine: RestorationMachine::new(),
                shared_outcome: None,
                success: false,
                pending_listeners: Vec::new(),
            }),
        }
    }
}

impl RestorationState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self) -> RestorationPhase {
        RestorationPhase::from(self.lock().machine.state())
    }

    pub fn is_complete(&self) -> bool {
        self.phase().is_settled()
    }

    pub fn is_in_progress(&self) -> bool {
        self.phase() == RestorationPhase::InProgress
    }

    /// The settled outcome. False until settlement.
    pub fn success(&self) -> bool {
        self.lock().success
    }

    /// Return the existing shared outcome, or move Idle→InProgress and
    /// install the one produced by `start`.
    ///
    /// `start` runs under the state lock and must not block.
    pub(crate) fn begin_or_join<F>(&self, start: F) -> SharedOutcome
    where
        F: FnOnce() -> SharedOutcome,
    {
        let mut inner = self.lock();
        if let Some(outcome) = &inner.shared_outcome {
            return outcome.clone();
        }

        if let Err(e) = inner.machine.consume(&RestorationInput::Begin) {
            // Unreachable while `shared_outcome` is only assigned here.
            error!(error = ?e, "Restoration state machine rejected Begin");
        }
        let outcome = start();
        inner.shared_outcome = Some(outcome.clone());
        outcome
    }

    /// The shared outcome while restoration is running.
    pub(crate) fn in_progress_outcome(&self) -> Option<SharedOutcome> {
        let inner = self.lock();
        if RestorationPhase::from(inner.machine.state()) == RestorationPhase::InProgress {
            inner.shared_outcome.clone()
        } else {
            None
        }
    }

    /// Queue `listener`, or hand it back if restoration already settled so the
    /// caller can fire it outside the lock.
    pub(crate) fn add_listener(&self, listener: CompletionListener) -> Option<CompletionListener> {
        let mut inner = self.lock();
        if RestorationPhase::from(inner.machine.state()).is_settled() {
            Some(listener)
        } else {
            inner.pending_listeners.push(listener);
            None
        }
    }

    /// Fire every pending listener with `success`, then fix the terminal state.
    ///
    /// Listeners run outside the lock. Any registered while they run are
    /// picked up by the next pass, so each fires exactly once.
    pub(crate) fn settle(&self, success: bool) {
        loop {
            let listeners = {
                let mut inner = self.lock();
                if RestorationPhase::from(inner.machine.state()).is_settled() {
                    return;
                }
                let listeners = std::mem::take(&mut inner.pending_listeners);
                if listeners.is_empty() {
                    let input = if success {
                        RestorationInput::Succeeded
                    } else {
                        RestorationInput::Failed
                    };
                    if let Err(e) = inner.machine.consume(&input) {
                        error!(error = ?e, "Restoration state machine rejected settlement");
                    }
                    inner.success = success;
                    break;
                }
                listeners
            };

            debug!(count = listeners.len(), success, "Firing restoration listeners");
            for listener in listeners {
                if std::panic::catch_unwind(AssertUnwindSafe(|| listener(success))).is_err() {
                    warn!("Restoration listener panicked");
                }
            }
        }

        info!(success, "Restoration settled");
    }
}

/// Runs the restoration sequence once and shares its outcome.
#[derive(Clone)]
pub struct RestorationCoordinator {
    state: Arc<RestorationState>,
    handle: Arc<dyn PrimarySessionHandle>,
    backup: Arc<dyn BackupStore>,
    establish_timeout: Duration,
}

impl RestorationCoordinator {
    pub fn new(
        state: Arc<RestorationState>,
        handle: Arc<dyn PrimarySessionHandle>,
        backup: Arc<dyn BackupStore>,
        establish_timeout: Duration,
    ) -> Self {
        Self {
            state,
            handle,
            backup,
            establish_timeout,
        }
    }

    pub fn state(&self) -> &Arc<RestorationState> {
        &self.state
    }

    /// Start restoration if it has not started, then await its outcome.
    ///
    /// The sequence runs on its own task, so dropping this future does not
    /// cancel it.
    pub async fn restore(&self) -> bool {
        let outcome = self.state.begin_or_join(|| self.spawn_sequence());
        outcome.await
    }

    fn spawn_sequence(&self) -> SharedOutcome {
        let state = self.state.clone();
        let handle = self.handle.clone();
        let backup = self.backup.clone();
        let establish_timeout = self.establish_timeout;

        let task = tokio::spawn(async move {
            let success = match AssertUnwindSafe(run_sequence(handle, backup, establish_timeout))
                .catch_unwind()
                .await
            {
                Ok(success) => success,
                Err(_) => {
                    error!("Restoration sequence panicked");
                    false
                }
            };
            state.settle(success);
            success
        });

        let state = self.state.clone();
        async move {
            match task.await {
                Ok(success) => success,
                Err(e) => {
                    error!(error = %e, "Restoration task failed");
                    state.settle(false);
                    false
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn run_sequence(
    handle: Arc<dyn PrimarySessionHandle>,
    backup: Arc<dyn BackupStore>,
    establish_timeout: Duration,
) -> bool {
    match attempt_restore(handle.as_ref(), backup.as_ref(), establish_timeout).await {
        Ok(success) => success,
        Err(e) => {
            warn!(error = %e, "Restoration failed unexpectedly");
            false
        }
    }
}

async fn attempt_restore(
    handle: &dyn PrimarySessionHandle,
    backup: &dyn BackupStore,
    establish_timeout: Duration,
) -> AuthResult<bool> {
    if let Some(session) = handle.get_current().await? {
        info!(user_id = %session.user_id, "Primary session present");
        return Ok(true);
    }

    let Some(record) = backup.load().await else {
        info!("No primary session and no usable backup");
        return Ok(false);
    };

    info!(user_id = %record.user_id, "Primary session missing, restoring from backup");

    let established = match tokio::time::timeout(
        establish_timeout,
        handle.establish(&record.access_token, &record.refresh_token),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => adopted_before_deadline(handle).await,
    };

    match established {
        Ok(session) => {
            info!(user_id = %session.user_id, "Session restored from backup");
            Ok(true)
        }
        Err(e) => {
            warn!(
                user_id = %record.user_id,
                error = %e,
                "Backup session rejected, clearing backup"
            );
            backup.clear().await;
            Ok(false)
        }
    }
}

/// The primary tier was empty when the sequence started, so a session found
/// after the deadline was committed by the timed-out establish.
async fn adopted_before_deadline(handle: &dyn PrimarySessionHandle) -> AuthResult<Session> {
    match handle.get_current().await {
        Ok(Some(session)) => {
            warn!(user_id = %session.user_id, "Establish timed out after adopting the session");
            Ok(session)
        }
        Ok(None) => Err(AuthError::Timeout),
        Err(e) => {
            debug!(error = %e, "Primary tier unreadable after establish timeout");
            Err(AuthError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn started(outcome: bool) -> RestorationState {
        let state = RestorationState::new();
        state.begin_or_join(|| futures_util::future::ready(outcome).boxed().shared());
        state
    }

    #[test]
    fn test_listener_before_settlement_fires_once() {
        let state = started(true);
        assert!(state.is_in_progress());
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        assert!(state
            .add_listener(Box::new(move |success| {
                assert!(success);
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .is_none());

        state.settle(true);
        state.settle(false);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(state.success());
        assert_eq!(state.phase(), RestorationPhase::Restored);
    }

    #[test]
    fn test_listener_after_settlement_is_handed_back() {
        let state = started(false);
        state.settle(false);

        let returned = state.add_listener(Box::new(|_| {}));
        assert!(returned.is_some());
        assert!(state.is_complete());
        assert!(!state.success());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let state = started(true);
        let fired = Arc::new(AtomicUsize::new(0));

        state.add_listener(Box::new(|_| panic!("listener failure")));
        let counter = fired.clone();
        state.add_listener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        state.settle(true);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(state.is_complete());
    }

    #[test]
    fn test_idle_state_has_no_outcome() {
        let state = RestorationState::new();
        assert_eq!(state.phase(), RestorationPhase::Idle);
        assert!(state.in_progress_outcome().is_none());
        assert!(!state.is_in_progress());
    }

    #[test]
    fn test_second_begin_joins_first_outcome() {
        let state = started(true);
        let mut started_again = false;
        state.begin_or_join(|| {
            started_again = true;
            futures_util::future::ready(false).boxed().shared()
        });
        assert!(!started_again);
        assert!(state.in_progress_outcome().is_some());
    }
}
