//! Storage trait definitions for onboardkit
//!
//! - `LocalStore`: namespaced byte store (get/set/delete by key)
//! - `LocalStoreExt`: typed JSON access layered over any `LocalStore`
//!
//! Writes are synchronous from the caller's point of view: when `set`
//! returns `Ok`, the value survives a process restart (for durable
//! backends). In-memory fakes are provided via the `fakes` module.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Namespaced persistent key/value byte store.
///
/// Guarantees:
/// - `set(k, v)` followed by `get(k)` returns exactly `v`.
/// - `delete(k)` on an absent key is a no-op.
/// - Keys of one namespace never observe values written under another.
pub trait LocalStore: Send + Sync {
    /// Read the bytes stored under `key`, `None` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Remove `key`. No-op if absent.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether a value exists under `key`.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// JSON helpers for any [`LocalStore`].
///
/// Values are always serialized structured records, never raw
/// language-native objects.
pub trait LocalStoreExt: LocalStore {
    /// Decode the JSON record under `key`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                StorageError::Deserialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }

    /// Encode `value` as JSON and store it under `key`.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set(key, &bytes)
    }
}

impl<S: LocalStore + ?Sized> LocalStoreExt for S {}

/// Reject keys that cannot be addressed.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Join a namespace and a key into the fully qualified storage key.
pub(crate) fn qualify(namespace: &str, key: &str) -> String {
    format!("{namespace}/{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_prefixes_namespace() {
        assert_eq!(qualify("app", "session_id"), "app/session_id");
    }

    #[test]
    fn blank_keys_rejected() {
        assert!(matches!(validate_key(""), Err(StorageError::InvalidKey(_))));
        assert!(matches!(validate_key("   "), Err(StorageError::InvalidKey(_))));
        assert!(validate_key("user_id").is_ok());
    }
}
