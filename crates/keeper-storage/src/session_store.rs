//! Primary session persistence on top of [`SecureStorage`].

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use keeper_config_and_utils::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Session metadata stored alongside the tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// User ID from the auth service
    pub user_id: String,
    /// User email from the auth service
    #[serde(default)]
    pub email: Option<String>,
    /// When the access token expires (epoch seconds)
    pub expires_at: i64,
}

/// Reads and writes the primary session as three storage entries.
pub struct PrimarySessionStore {
    storage: Box<dyn SecureStorage>,
}

impl PrimarySessionStore {
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Store a complete session (tokens + metadata).
    pub fn set_session(&self, session: &Session) -> StorageResult<()> {
        let meta = SessionMeta {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            expires_at: session.expires_at,
        };
        let json =
            serde_json::to_string(&meta).map_err(|e| StorageError::Encoding(e.to_string()))?;

        self.storage
            .set(StorageKeys::SESSION_ACCESS_TOKEN, &session.access_token)?;
        self.storage
            .set(StorageKeys::SESSION_REFRESH_TOKEN, &session.refresh_token)?;
        self.storage.set(StorageKeys::SESSION_META, &json)?;
        debug!(user_id = %session.user_id, "Stored primary session");
        Ok(())
    }

    /// Load the stored session.
    ///
    /// Partial state (a missing token or metadata entry, or unreadable
    /// metadata) is cleared and reported as no session.
    pub fn get_session(&self) -> StorageResult<Option<Session>> {
        let access = self.storage.get(StorageKeys::SESSION_ACCESS_TOKEN)?;
        let refresh = self.storage.get(StorageKeys::SESSION_REFRESH_TOKEN)?;
        let meta = self.storage.get(StorageKeys::SESSION_META)?;

        let (access, refresh, meta) = match (access, refresh, meta) {
            (None, None, None) => return Ok(None),
            (Some(a), Some(r), Some(m)) if !a.is_empty() && !r.is_empty() => (a, r, m),
            _ => {
                warn!("Primary session is incomplete, clearing it");
                self.clear_session()?;
                return Ok(None);
            }
        };

        let meta: SessionMeta = match serde_json::from_str(&meta) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(error = %e, "Primary session metadata is unreadable, clearing it");
                self.clear_session()?;
                return Ok(None);
            }
        };

        Ok(Some(
            Session::new(access, refresh, meta.expires_at, meta.user_id).with_email(meta.email),
        ))
    }

    /// Remove every session entry. Missing entries are not an error.
    pub fn clear_session(&self) -> StorageResult<()> {
        for key in StorageKeys::ALL_SESSION_KEYS {
            self.storage.delete(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn store() -> PrimarySessionStore {
        PrimarySessionStore::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_session_roundtrip() {
        let store = store();
        assert!(store.get_session().unwrap().is_none());

        let session = Session::new("access-token", "refresh-token", 1_700_000_000, "user-123")
            .with_email(Some("test@example.com".to_string()));
        store.set_session(&session).unwrap();

        assert_eq!(store.get_session().unwrap(), Some(session));

        store.clear_session().unwrap();
        store.clear_session().unwrap();
        assert!(store.get_session().unwrap().is_none());
    }

    #[test]
    fn test_partial_session_is_cleared() {
        let storage = MemoryStorage::new();
        storage
            .set(StorageKeys::SESSION_ACCESS_TOKEN, "access-only")
            .unwrap();
        let store = PrimarySessionStore::new(Box::new(storage));

        assert!(store.get_session().unwrap().is_none());
        assert!(!store.storage.has(StorageKeys::SESSION_ACCESS_TOKEN).unwrap());
    }

    #[test]
    fn test_corrupt_meta_is_cleared() {
        let store = store();
        store
            .set_session(&Session::new("a", "r", 10, "u"))
            .unwrap();
        store.storage.set(StorageKeys::SESSION_META, "{not json").unwrap();

        assert!(store.get_session().unwrap().is_none());
        assert!(!store.storage.has(StorageKeys::SESSION_ACCESS_TOKEN).unwrap());
    }
}
