//! Windows Credential Vault backend.

use crate::{SecureStorage, StorageError, StorageResult};
use tracing::debug;
use windows::{
    core::HSTRING,
    Security::Credentials::{PasswordCredential, PasswordVault},
};

/// HRESULT for ERROR_NOT_FOUND.
const ERROR_NOT_FOUND: u32 = 0x8007_0490;

fn is_not_found(e: &windows::core::Error) -> bool {
    e.code().0 as u32 == ERROR_NOT_FOUND
}

/// Credential Vault storage. The resource is the service name, the user name
/// is the key.
pub struct CredentialStorage {
    resource_name: String,
}

impl CredentialStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        vault()?;
        Ok(Self {
            resource_name: service_name.to_string(),
        })
    }

    fn resource(&self) -> HSTRING {
        HSTRING::from(self.resource_name.as_str())
    }

    fn find(&self, key: &str) -> StorageResult<Option<PasswordCredential>> {
        match vault()?.Retrieve(&self.resource(), &HSTRING::from(key)) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to retrieve credential: {}",
                e
            ))),
        }
    }
}

fn vault() -> StorageResult<PasswordVault> {
    PasswordVault::new()
        .map_err(|e| StorageError::Platform(format!("Failed to access Credential Vault: {}", e)))
}

impl SecureStorage for CredentialStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(resource = %self.resource_name, key = %key, "Setting credential");
        self.delete(key)?;

        let credential = PasswordCredential::CreatePasswordCredential(
            &self.resource(),
            &HSTRING::from(key),
            &HSTRING::from(value),
        )
        .map_err(|e| StorageError::Platform(format!("Failed to create credential: {}", e)))?;

        vault()?
            .Add(&credential)
            .map_err(|e| StorageError::Platform(format!("Failed to add credential: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let Some(credential) = self.find(key)? else {
            return Ok(None);
        };
        credential
            .RetrievePassword()
            .map_err(|e| StorageError::Platform(format!("Failed to retrieve password: {}", e)))?;
        let password = credential
            .Password()
            .map_err(|e| StorageError::Platform(format!("Failed to read password: {}", e)))?;
        Ok(Some(password.to_string()))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let Some(credential) = self.find(key)? else {
            return Ok(false);
        };
        debug!(resource = %self.resource_name, key = %key, "Deleting credential");
        vault()?
            .Remove(&credential)
            .map_err(|e| StorageError::Platform(format!("Failed to remove credential: {}", e)))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Credential Vault access
    fn test_credential_roundtrip() {
        let storage = CredentialStorage::new("computer.session-keeper.test").unwrap();
        let _ = storage.delete("session_meta");

        storage.set("session_meta", "{}").unwrap();
        assert_eq!(storage.get("session_meta").unwrap(), Some("{}".to_string()));
        assert!(storage.delete("session_meta").unwrap());
        assert_eq!(storage.get("session_meta").unwrap(), None);
    }
}
