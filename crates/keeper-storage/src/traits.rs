//! Storage trait definitions.

use crate::StorageResult;

/// Trait for key/value secret storage backends
pub trait SecureStorage: Send + Sync {
    /// Store a value, replacing any existing one
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether anything was removed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
