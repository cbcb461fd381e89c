//! Session secret storage for the session keeper.
//!
//! Backends:
//! - **macOS**: Keychain via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//! - **Windows**: Credential Vault via `windows`
//! - **File**: one owner-only file per key under `~/.session-keeper/session`,
//!   used when no OS keychain is reachable
//! - **Memory**: process-local map, for tests and `--ephemeral` runs

mod file;
mod keys;
mod memory;
mod session_store;
mod traits;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use session_store::{PrimarySessionStore, SessionMeta};
pub use traits::SecureStorage;

use keeper_config_and_utils::Paths;
use thiserror::Error;
use tracing::warn;

/// Service name that namespaces every keychain entry.
pub const SERVICE_NAME: &str = "computer.session-keeper";

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the OS keychain storage for this platform.
pub fn create_keychain_storage() -> StorageResult<Box<dyn SecureStorage>> {
    #[cfg(target_os = "macos")]
    {
        let storage = macos::KeychainStorage::new(SERVICE_NAME)?;
        Ok(Box::new(storage))
    }

    #[cfg(target_os = "linux")]
    {
        let storage = linux::SecretServiceStorage::new(SERVICE_NAME)?;
        Ok(Box::new(storage))
    }

    #[cfg(target_os = "windows")]
    {
        let storage = windows::CredentialStorage::new(SERVICE_NAME)?;
        Ok(Box::new(storage))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(StorageError::Platform(
            "No OS keychain available on this platform".to_string(),
        ))
    }
}

/// Create the primary tier storage: the OS keychain, or owner-only files under
/// the primary session directory when the keychain cannot be reached.
pub fn create_storage(paths: &Paths) -> StorageResult<Box<dyn SecureStorage>> {
    or_file_fallback(create_keychain_storage(), paths)
}

fn or_file_fallback(
    keychain: StorageResult<Box<dyn SecureStorage>>,
    paths: &Paths,
) -> StorageResult<Box<dyn SecureStorage>> {
    match keychain {
        Ok(storage) => Ok(storage),
        Err(e) => {
            let dir = paths.primary_session_dir();
            warn!(error = %e, dir = %dir.display(), "OS keychain unavailable, storing session in files");
            Ok(Box::new(FileStorage::new(dir)?))
        }
    }
}

/// Create a PrimarySessionStore with the default storage.
pub fn create_session_store(paths: &Paths) -> StorageResult<PrimarySessionStore> {
    let storage = create_storage(paths)?;
    Ok(PrimarySessionStore::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys_unique() {
        let unique: std::collections::HashSet<_> = StorageKeys::ALL_SESSION_KEYS.iter().collect();
        assert_eq!(unique.len(), StorageKeys::ALL_SESSION_KEYS.len());
        assert!(StorageKeys::ALL_SESSION_KEYS.iter().all(|k| !k.is_empty()));
    }

    #[test]
    fn test_reachable_keychain_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let keychain: Box<dyn SecureStorage> = Box::new(MemoryStorage::new());
        let storage = or_file_fallback(Ok(keychain), &paths).unwrap();
        storage.set(StorageKeys::SESSION_ACCESS_TOKEN, "a1").unwrap();

        assert_eq!(
            storage.get(StorageKeys::SESSION_ACCESS_TOKEN).unwrap(),
            Some("a1".to_string())
        );
        assert!(!paths.primary_session_dir().exists());
    }

    #[test]
    fn test_unreachable_keychain_falls_back_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let unreachable = Err(StorageError::Platform("no session bus".to_string()));
        let store = PrimarySessionStore::new(or_file_fallback(unreachable, &paths).unwrap());
        let session = keeper_config_and_utils::Session::new("a1", "r1", 1_000, "user-1");
        store.set_session(&session).unwrap();

        assert!(paths
            .primary_session_dir()
            .join(StorageKeys::SESSION_ACCESS_TOKEN)
            .exists());
        assert_eq!(store.get_session().unwrap(), Some(session));
    }
}
