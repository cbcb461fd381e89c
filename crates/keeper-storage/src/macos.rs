//! macOS Keychain backend.

use crate::{SecureStorage, StorageError, StorageResult};
use security_framework::base::Error as SecurityError;
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use security_framework_sys::base::errSecItemNotFound;
use tracing::debug;

/// Generic-password items under one service name, one account per key.
pub struct KeychainStorage {
    service_name: String,
}

fn is_not_found(e: &SecurityError) -> bool {
    e.code() == errSecItemNotFound
}

impl KeychainStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        Ok(Self {
            service_name: service_name.to_string(),
        })
    }
}

impl SecureStorage for KeychainStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting keychain item");
        set_generic_password(&self.service_name, key, value.as_bytes()).map_err(|e| {
            StorageError::Platform(format!("Failed to set keychain item: {}", e))
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match get_generic_password(&self.service_name, key) {
            Ok(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to get keychain item: {}",
                e
            ))),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");
        match delete_generic_password(&self.service_name, key) {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to delete keychain item: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SERVICE: &str = "computer.session-keeper.test";

    #[test]
    #[ignore] // Requires Keychain access
    fn test_keychain_roundtrip() {
        let storage = KeychainStorage::new(TEST_SERVICE).unwrap();
        let _ = storage.delete("session_refresh_token");

        storage.set("session_refresh_token", "r1").unwrap();
        storage.set("session_refresh_token", "r2").unwrap();
        assert_eq!(
            storage.get("session_refresh_token").unwrap(),
            Some("r2".to_string())
        );

        assert!(storage.delete("session_refresh_token").unwrap());
        assert!(!storage.delete("session_refresh_token").unwrap());
        assert_eq!(storage.get("session_refresh_token").unwrap(), None);
    }
}
