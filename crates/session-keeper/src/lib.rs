//! Session persistence and recovery.
//!
//! This crate provides:
//! - The [`PrimarySessionHandle`] seam and a Supabase-backed implementation
//! - Single-flight restoration from the durable backup store
//! - Completion notifications for restoration
//! - A listener that mirrors session changes into the backup store
//! - Proactive token refresh on lifecycle signals
//!
//! ```ignore
//! let keeper = SessionKeeper::new(handle, backup, clock, KeeperOptions::from(&config));
//! if keeper.ensure_session().await {
//!     // primary session is usable
//! }
//! ```

mod error;
mod keeper;
mod notifier;
mod primary;
mod refresh_scheduler;
mod restoration;
mod restoration_fsm;
mod supabase;
mod sync_listener;

pub use error::{AuthError, AuthResult};
pub use keeper::{KeeperOptions, SessionKeeper};
pub use notifier::CompletionNotifier;
pub use primary::{
    AuthChangeEvent, AuthEvent, AuthEventEmitter, AuthStateListener, PrimarySessionHandle,
};
pub use refresh_scheduler::{LifecycleRefreshScheduler, LifecycleSignal};
pub use restoration::{CompletionListener, RestorationCoordinator, RestorationState};
pub use restoration_fsm::restoration_machine;
pub use restoration_fsm::{
    RestorationInput, RestorationMachine, RestorationMachineState, RestorationPhase,
};
pub use supabase::{jwt_expiry, RefreshConfig, SupabaseSessionHandle};
pub use sync_listener::BackupSyncListener;
