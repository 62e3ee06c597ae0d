//! In-memory store
//!
//! `MemoryStore` satisfies the `LocalStore` contract without touching the
//! filesystem. Share one instance behind an `Arc` to simulate a process
//! restart: services rebuilt on the same store see everything the previous
//! generation persisted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::storage_traits::{qualify, validate_key, LocalStore, StorageResult};
use crate::DEFAULT_NAMESPACE;

/// In-memory store backed by a `HashMap<namespaced key, bytes>`.
#[derive(Debug)]
pub struct MemoryStore {
    namespace: String,
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys stored under this namespace.
    pub fn len(&self) -> usize {
        let prefix = qualify(&self.namespace, "");
        self.lock()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.lock().get(&qualify(&self.namespace, key)).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.lock()
            .insert(qualify(&self.namespace, key), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.lock().remove(&qualify(&self.namespace, key));
        Ok(())
    }
}
