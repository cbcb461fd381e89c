//! Proactive token refresh on application lifecycle signals.
//!
//! A suspended process can wake up holding an access token that expired while
//! it slept. Each lifecycle signal checks the remaining lifetime and asks the
//! handle to refresh when it is short.

use crate::{AuthResult, PrimarySessionHandle};
use keeper_config_and_utils::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Host lifecycle signals. Both are handled the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The application became visible (or the process resumed).
    BecameVisible,
    /// A window gained focus.
    GainedFocus,
}

/// Refreshes the primary session when it is close to expiry.
#[derive(Clone)]
pub struct LifecycleRefreshScheduler {
    handle: Arc<dyn PrimarySessionHandle>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
}

impl LifecycleRefreshScheduler {
    pub fn new(
        handle: Arc<dyn PrimarySessionHandle>,
        clock: Arc<dyn Clock>,
        threshold: Duration,
    ) -> Self {
        Self {
            handle,
            clock,
            threshold,
        }
    }

    /// Handle one signal. Returns whether a refresh was requested.
    pub async fn handle_signal(&self, signal: LifecycleSignal) -> AuthResult<bool> {
        let Some(session) = self.handle.get_current().await? else {
            debug!(?signal, "No primary session, nothing to refresh");
            return Ok(false);
        };

        let remaining = session.remaining_lifetime(self.clock.now_secs());
        let threshold = i64::try_from(self.threshold.as_secs()).unwrap_or(i64::MAX);

        if remaining >= threshold {
            debug!(?signal, remaining, "Access token still fresh");
            return Ok(false);
        }

        info!(?signal, remaining, user_id = %session.user_id, "Access token near expiry, refreshing");
        self.handle.refresh_if_needed().await?;
        Ok(true)
    }

    /// Consume signals until the channel closes or `shutdown` fires.
    ///
    /// Every signal gets its own task, so handlers may overlap.
    pub async fn run(
        &self,
        mut signals: mpsc::Receiver<LifecycleSignal>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!(threshold_secs = self.threshold.as_secs(), "Lifecycle refresh scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Lifecycle refresh scheduler shutting down");
                    break;
                }
                signal = signals.recv() => {
                    let Some(signal) = signal else {
                        debug!("Lifecycle signal source closed");
                        break;
                    };
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = scheduler.handle_signal(signal).await {
                            warn!(?signal, error = %e, "Lifecycle refresh failed");
                        }
                    });
                }
            }
        }
    }
}
