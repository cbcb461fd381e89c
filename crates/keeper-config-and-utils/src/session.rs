//! The unit of authentication state.

use serde::{Deserialize, Serialize};

/// An access/refresh token pair plus the identity and expiry it carries.
///
/// Tokens are opaque. A session is only meaningful as a pair: callers must
/// check [`Session::has_token_pair`] before persisting or acting on one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Short-lived credential presented on requests.
    pub access_token: String,
    /// Longer-lived credential used to mint a new access token.
    pub refresh_token: String,
    /// Epoch seconds when `access_token` becomes invalid.
    pub expires_at: i64,
    /// Identity the session authenticates.
    pub user_id: String,
    /// Email reported by the auth service, if any.
    #[serde(default)]
    pub email: Option<String>,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            user_id: user_id.into(),
            email: None,
        }
    }

    /// Attach an email address.
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Both tokens are present.
    pub fn has_token_pair(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Seconds until the access token expires, relative to `now_secs`.
    /// Negative once expired.
    pub fn remaining_lifetime(&self, now_secs: i64) -> i64 {
        self.expires_at - now_secs
    }

    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.remaining_lifetime(now_secs) <= 0
    }
}

// Tokens stay out of Debug output so sessions can be logged freely.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_required() {
        let session = Session::new("a1", "r1", 100, "user-1");
        assert!(session.has_token_pair());

        let missing_refresh = Session::new("a1", "", 100, "user-1");
        assert!(!missing_refresh.has_token_pair());

        let missing_access = Session::new("", "r1", 100, "user-1");
        assert!(!missing_access.has_token_pair());
    }

    #[test]
    fn test_remaining_lifetime() {
        let session = Session::new("a1", "r1", 1_000, "user-1");
        assert_eq!(session.remaining_lifetime(880), 120);
        assert!(!session.is_expired(999));
        assert!(session.is_expired(1_000));
        assert!(session.remaining_lifetime(1_200) < 0);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let session = Session::new("secret-access", "secret-refresh", 1, "user-1");
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("user-1"));
    }

    #[test]
    fn test_serde_email_defaults_to_none() {
        let json = r#"{"access_token":"a","refresh_token":"r","expires_at":5,"user_id":"u"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.email, None);
        assert_eq!(session.expires_at, 5);
    }
}
