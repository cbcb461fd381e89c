//! Maps process signals onto lifecycle signals.
//!
//! A CLI has no windows, so resuming from a stop (SIGCONT) stands in for
//! becoming visible and SIGUSR1 stands in for gaining focus.

use session_keeper::LifecycleSignal;
use signal_hook::consts::{SIGCONT, SIGUSR1};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Forward SIGCONT and SIGUSR1 into `tx` until the receiver goes away.
pub fn forward(tx: mpsc::Sender<LifecycleSignal>) -> std::io::Result<JoinHandle<()>> {
    let mut resumed = signal(SignalKind::from_raw(SIGCONT))?;
    let mut focused = signal(SignalKind::from_raw(SIGUSR1))?;

    Ok(tokio::spawn(async move {
        loop {
            let lifecycle = tokio::select! {
                Some(()) = resumed.recv() => LifecycleSignal::BecameVisible,
                Some(()) = focused.recv() => LifecycleSignal::GainedFocus,
                else => break,
            };
            debug!(signal = ?lifecycle, "Lifecycle signal received");
            if tx.send(lifecycle).await.is_err() {
                break;
            }
        }
    }))
}
