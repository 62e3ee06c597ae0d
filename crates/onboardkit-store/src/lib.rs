//! onboardkit-store: Durable Key/Value Backend for onboardkit
//!
//! This crate is the only durability primitive of the onboarding runtime.
//! Everything the client must remember across restarts (navigation
//! progress, cached flows, variant assignments, the pending analytics
//! queue, session identity) is written through a [`LocalStore`].
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: crash-safe writes and namespace isolation.
//!
//! ## Key Components
//!
//! - `LocalStore`: get/set/delete of raw bytes by string key
//! - `LocalStoreExt`: JSON helpers on top of any `LocalStore`
//! - `MemoryStore`: in-memory implementation (tests, ephemeral sessions)
//! - `FsStore`: directory-backed implementation with atomic writes

mod error;
pub mod fakes;
mod fs;
pub mod storage_traits;

pub use error::StorageError;
pub use fakes::MemoryStore;
pub use fs::FsStore;
pub use storage_traits::{LocalStore, LocalStoreExt, StorageResult};

/// Namespace used when the caller does not pick one.
pub const DEFAULT_NAMESPACE: &str = "onboardkit";
