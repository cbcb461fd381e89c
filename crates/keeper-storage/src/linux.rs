//! Secret Service backend (GNOME Keyring, KWallet).

use crate::{SecureStorage, StorageError, StorageResult};
use secret_service::blocking::{Collection, SecretService};
use secret_service::EncryptionType;
use std::collections::HashMap;
use tracing::debug;

fn platform_error(context: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::Platform(format!("{}: {}", context, e))
}

/// Secret Service storage. Items are tagged with `service` and `key` attributes.
pub struct SecretServiceStorage {
    service_name: String,
}

impl SecretServiceStorage {
    /// Connect once to make sure a default collection is reachable.
    pub fn new(service_name: &str) -> StorageResult<Self> {
        let storage = Self {
            service_name: service_name.to_string(),
        };
        storage.with_collection(|_| Ok(()))?;
        Ok(storage)
    }

    fn with_collection<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Collection<'_>) -> StorageResult<T> + Send,
        T: Send,
    {
        // The blocking client drives its own executor, so keep it off runtime threads.
        std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let ss = SecretService::connect(EncryptionType::Dh)
                        .map_err(|e| platform_error("Failed to connect to Secret Service", e))?;
                    let collection = ss
                        .get_default_collection()
                        .map_err(|e| platform_error("No default Secret Service collection", e))?;
                    if collection.is_locked().unwrap_or(false) {
                        collection
                            .unlock()
                            .map_err(|e| platform_error("Failed to unlock collection", e))?;
                    }
                    f(&collection)
                })
                .join()
                .map_err(|_| StorageError::Platform("Secret Service worker panicked".to_string()))?
        })
    }

    fn attributes<'a>(&'a self, key: &'a str) -> HashMap<&'a str, &'a str> {
        HashMap::from([("service", self.service_name.as_str()), ("key", key)])
    }
}

impl SecureStorage for SecretServiceStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting secret");
        self.with_collection(|collection| {
            let label = format!("{}/{}", self.service_name, key);
            collection
                .create_item(&label, self.attributes(key), value.as_bytes(), true, "text/plain")
                .map_err(|e| platform_error("Failed to store secret", e))?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_collection(|collection| {
            let items = collection
                .search_items(self.attributes(key))
                .map_err(|e| platform_error("Failed to search secrets", e))?;
            let Some(item) = items.first() else {
                return Ok(None);
            };
            let secret = item
                .get_secret()
                .map_err(|e| platform_error("Failed to read secret", e))?;
            String::from_utf8(secret)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string()))
        })
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting secret");
        self.with_collection(|collection| {
            let items = collection
                .search_items(self.attributes(key))
                .map_err(|e| platform_error("Failed to search secrets", e))?;
            for item in &items {
                item.delete()
                    .map_err(|e| platform_error("Failed to delete secret", e))?;
            }
            Ok(!items.is_empty())
        })
    }
}
