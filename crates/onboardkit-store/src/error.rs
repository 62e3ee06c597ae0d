//! Error types for onboardkit-store

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying filesystem failure
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded before writing
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Stored bytes could not be decoded into the requested type
    #[error("Deserialization failed for key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// Empty or otherwise unusable key
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}
