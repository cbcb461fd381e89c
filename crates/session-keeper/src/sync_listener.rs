//! Mirrors primary session changes into the backup store.

use crate::{AuthChangeEvent, AuthEvent, AuthStateListener};
use async_trait::async_trait;
use session_backup_store::BackupStore;
use std::sync::Arc;
use tracing::debug;

/// Keeps the backup store in step with the primary session handle.
pub struct BackupSyncListener {
    backup: Arc<dyn BackupStore>,
}

impl BackupSyncListener {
    pub fn new(backup: Arc<dyn BackupStore>) -> Self {
        Self { backup }
    }
}

#[async_trait]
impl AuthStateListener for BackupSyncListener {
    async fn on_auth_event(&self, event: &AuthEvent) {
        match (event.kind, &event.session) {
            (AuthChangeEvent::SignedIn | AuthChangeEvent::TokenRefreshed, Some(session)) => {
                debug!(event = ?event.kind, user_id = %session.user_id, "Mirroring session to backup");
                self.backup.save(session).await;
            }
            (AuthChangeEvent::SignedIn | AuthChangeEvent::TokenRefreshed, None) => {
                debug!(event = ?event.kind, "Auth event without a session, backup untouched");
            }
            (AuthChangeEvent::SignedOut, _) => {
                debug!("Signed out, clearing backup");
                self.backup.clear().await;
            }
        }
    }
}
