//! The primary session handle seam.
//!
//! A [`PrimarySessionHandle`] owns the live session as the auth service sees
//! it. Everything else in this crate talks to the service only through it.

use crate::AuthResult;
use async_trait::async_trait;
use keeper_config_and_utils::Session;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Kind of auth state change reported by a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthChangeEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// An auth state change and the session it produced, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: AuthChangeEvent::SignedIn,
            session: Some(session),
        }
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: AuthChangeEvent::TokenRefreshed,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: AuthChangeEvent::SignedOut,
            session: None,
        }
    }
}

/// Receives auth state changes from a [`PrimarySessionHandle`].
#[async_trait]
pub trait AuthStateListener: Send + Sync {
    async fn on_auth_event(&self, event: &AuthEvent);
}

/// Client-side view of the auth service's session.
#[async_trait]
pub trait PrimarySessionHandle: Send + Sync {
    /// The live session, if any.
    async fn get_current(&self) -> AuthResult<Option<Session>>;

    /// Adopt an externally supplied token pair as the live session.
    async fn establish(&self, access_token: &str, refresh_token: &str) -> AuthResult<Session>;

    /// Register a listener for the rest of the handle's lifetime.
    fn subscribe(&self, listener: Arc<dyn AuthStateListener>);

    /// Rotate the access token using the stored refresh token.
    async fn refresh_if_needed(&self) -> AuthResult<()>;
}

/// Listener list with serialized delivery.
///
/// An event reaches every listener, each awaited in turn, before the next
/// event is delivered.
#[derive(Default)]
pub struct AuthEventEmitter {
    listeners: Mutex<Vec<Arc<dyn AuthStateListener>>>,
    delivery: tokio::sync::Mutex<()>,
}

impl AuthEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn AuthStateListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub async fn emit(&self, event: AuthEvent) {
        let _delivery = self.delivery.lock().await;
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        debug!(
            event = ?event.kind,
            listeners = listeners.len(),
            "Delivering auth event"
        );

        for listener in listeners {
            listener.on_auth_event(&event).await;
        }
    }
}
