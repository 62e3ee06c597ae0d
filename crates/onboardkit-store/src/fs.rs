//! Durable [`LocalStore`] backed by plain files.
//!
//! One file per key under a namespace directory. Writes go to a temp file
//! in the same shard and are renamed into place, so a reader sees either
//! the old value or the new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::storage_traits::{qualify, validate_key, LocalStore, StorageResult};
use crate::DEFAULT_NAMESPACE;

/// Filesystem-backed store with git-style 2-char sharding.
///
/// Layout: `<root>/<namespace>/<first 2 hex chars>/<remaining hex chars>`
/// where the hex string is the SHA-256 of the namespaced key. Keys may
/// contain any characters (flow keys, user ids) without escaping concerns.
pub struct FsStore {
    namespace: String,
    entries_dir: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root` under the default namespace.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_namespace(root, DEFAULT_NAMESPACE)
    }

    /// Create a store rooted at `root` under `namespace`. Creates the
    /// namespace directory if needed.
    pub fn with_namespace(root: impl AsRef<Path>, namespace: &str) -> StorageResult<Self> {
        let entries_dir = root.as_ref().join(namespace);
        fs::create_dir_all(&entries_dir)?;
        Ok(Self {
            namespace: namespace.to_string(),
            entries_dir,
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hex = hex::encode(Sha256::digest(qualify(&self.namespace, key).as_bytes()));
        self.entries_dir.join(&hex[..2]).join(&hex[2..])
    }
}

impl LocalStore for FsStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let path = self.entry_path(key);
        let shard_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.entries_dir.clone());
        fs::create_dir_all(&shard_dir)?;

        // Atomic write: temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(&shard_dir)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(key = %key, bytes = value.len(), "store entry written");
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
