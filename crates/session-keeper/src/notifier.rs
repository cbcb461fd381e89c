//! Completion notifications for restoration.

use crate::RestorationState;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::warn;

/// Lets callers wait for, or be told about, the restoration outcome.
///
/// Never triggers restoration itself.
#[derive(Clone)]
pub struct CompletionNotifier {
    state: Arc<RestorationState>,
}

impl CompletionNotifier {
    pub fn new(state: Arc<RestorationState>) -> Self {
        Self { state }
    }

    /// Fire `callback` with the outcome once restoration settles, or right
    /// away if it already has.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if let Some(callback) = self.state.add_listener(Box::new(callback)) {
            let success = self.state.success();
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(success))).is_err() {
                warn!("Restoration listener panicked");
            }
        }
    }

    /// Await the running restoration, or return the settled outcome.
    /// Returns false if restoration has not been started.
    pub async fn await_ready(&self) -> bool {
        match self.state.in_progress_outcome() {
            Some(outcome) => outcome.await,
            None => self.state.success(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_await_ready_before_any_attempt_is_false() {
        let notifier = CompletionNotifier::new(Arc::new(RestorationState::new()));
        assert!(!notifier.await_ready().await);
    }

    #[test]
    fn test_on_complete_before_any_attempt_is_queued() {
        let state = Arc::new(RestorationState::new());
        let notifier = CompletionNotifier::new(state.clone());
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        notifier.on_complete(move |_| flag.store(true, Ordering::SeqCst));

        assert!(!fired.load(Ordering::SeqCst));
        assert!(!state.is_complete());
    }

    #[tokio::test]
    async fn test_panicking_callback_after_settlement_is_contained() {
        let state = Arc::new(RestorationState::new());
        state.begin_or_join(|| {
            use futures_util::FutureExt;
            futures_util::future::ready(true).boxed().shared()
        });
        state.settle(true);
        let notifier = CompletionNotifier::new(state);

        notifier.on_complete(|_| panic!("callback failure"));

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        notifier.on_complete(move |success| flag.store(success, Ordering::SeqCst));
        assert!(fired.load(Ordering::SeqCst));
        assert!(notifier.await_ready().await);
    }
}
