//! Backup record model.

use chrono::Duration;
use keeper_config_and_utils::Session;
use serde::{Deserialize, Serialize};

/// The single well-known row key.
pub const CURRENT_SESSION_KEY: &str = "current_session";

/// A persisted copy of the session plus the time it was written.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch seconds.
    pub expires_at: i64,
    pub user_id: String,
    pub email: Option<String>,
    /// Epoch milliseconds, stamped by the store at write time.
    pub saved_at: i64,
}

impl BackupRecord {
    pub fn from_session(session: &Session, saved_at: i64) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            saved_at,
        }
    }

    pub fn to_session(&self) -> Session {
        Session::new(
            self.access_token.clone(),
            self.refresh_token.clone(),
            self.expires_at,
            self.user_id.clone(),
        )
        .with_email(self.email.clone())
    }

    /// Expired access token, or written longer ago than `retention`.
    pub fn is_stale(&self, now_millis: i64, retention: Duration) -> bool {
        let expired = self.expires_at <= now_millis.div_euclid(1000);
        let too_old = now_millis - self.saved_at > retention.num_milliseconds();
        expired || too_old
    }
}

impl std::fmt::Debug for BackupRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupRecord")
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("saved_at", &self.saved_at)
            .finish_non_exhaustive()
    }
}
