//! Wiring for the whole session keeper.

use crate::{
    BackupSyncListener, CompletionNotifier, LifecycleRefreshScheduler, PrimarySessionHandle,
    RestorationCoordinator, RestorationPhase, RestorationState,
};
use keeper_config_and_utils::{Clock, Config};
use session_backup_store::BackupStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tunables for [`SessionKeeper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperOptions {
    /// Refresh on a lifecycle signal when less lifetime than this remains.
    pub refresh_threshold: Duration,
    /// Upper bound on adopting a recovered token pair.
    pub establish_timeout: Duration,
}

impl Default for KeeperOptions {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::from_secs(300),
            establish_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&Config> for KeeperOptions {
    fn from(config: &Config) -> Self {
        Self {
            refresh_threshold: config.refresh_threshold(),
            establish_timeout: config.establish_timeout(),
        }
    }
}

/// One primary handle, one backup store, and the components between them.
///
/// Construction subscribes the backup sync listener to the handle, so it is
/// in place before any restoration can run.
pub struct SessionKeeper {
    handle: Arc<dyn PrimarySessionHandle>,
    backup: Arc<dyn BackupStore>,
    coordinator: RestorationCoordinator,
    notifier: CompletionNotifier,
    scheduler: LifecycleRefreshScheduler,
}

impl SessionKeeper {
    pub fn new(
        handle: Arc<dyn PrimarySessionHandle>,
        backup: Arc<dyn BackupStore>,
        clock: Arc<dyn Clock>,
        options: KeeperOptions,
    ) -> Self {
        handle.subscribe(Arc::new(BackupSyncListener::new(backup.clone())));
        debug!(?options, "Backup sync listener attached");

        let state = Arc::new(RestorationState::new());
        let coordinator = RestorationCoordinator::new(
            state.clone(),
            handle.clone(),
            backup.clone(),
            options.establish_timeout,
        );
        let notifier = CompletionNotifier::new(state);
        let scheduler =
            LifecycleRefreshScheduler::new(handle.clone(), clock, options.refresh_threshold);

        Self {
            handle,
            backup,
            coordinator,
            notifier,
            scheduler,
        }
    }

    /// Trigger restoration if nobody has yet, and await the outcome.
    pub async fn ensure_session(&self) -> bool {
        self.coordinator.restore().await
    }

    /// See [`CompletionNotifier::await_ready`]. Does not trigger restoration.
    pub async fn await_ready(&self) -> bool {
        self.notifier.await_ready().await
    }

    /// See [`CompletionNotifier::on_complete`].
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.notifier.on_complete(callback);
    }

    pub fn phase(&self) -> RestorationPhase {
        self.coordinator.state().phase()
    }

    pub fn handle(&self) -> &Arc<dyn PrimarySessionHandle> {
        &self.handle
    }

    pub fn backup(&self) -> &Arc<dyn BackupStore> {
        &self.backup
    }

    pub fn coordinator(&self) -> &RestorationCoordinator {
        &self.coordinator
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.notifier
    }

    pub fn scheduler(&self) -> &LifecycleRefreshScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.refresh_threshold_secs = 60;
        config.establish_timeout_secs = 3;

        let options = KeeperOptions::from(&config);
        assert_eq!(options.refresh_threshold, Duration::from_secs(60));
        assert_eq!(options.establish_timeout, Duration::from_secs(3));
        assert_eq!(KeeperOptions::default(), KeeperOptions::from(&Config::default()));
    }
}
