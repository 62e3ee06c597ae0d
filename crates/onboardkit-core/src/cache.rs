//! Last-known-good flow cache, time-boxed variant cache, and theme store.
//!
//! The caches are an availability optimization: every read or write
//! failure is logged and treated as a miss, never surfaced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use onboardkit_store::{LocalStore, LocalStoreExt};
use tracing::{debug, warn};

use crate::domain::{CacheEntry, FlowPayload, Theme, VariantAssignment};
use crate::session::Identity;
use crate::storage_keys;

/// Flow payloads by flow key (or lookup alias). Entries never expire.
#[derive(Clone)]
pub struct FlowCache {
    store: Arc<dyn LocalStore>,
}

impl FlowCache {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn put(&self, key: &str, flow: &FlowPayload) {
        let entry = CacheEntry::permanent(flow);
        if let Err(e) = self.store.set_json(&storage_keys::flow_cache(key), &entry) {
            warn!(key = %key, error = %e, "flow cache write failed");
        }
    }

    pub fn get(&self, key: &str) -> Option<FlowPayload> {
        match self
            .store
            .get_json::<CacheEntry<FlowPayload>>(&storage_keys::flow_cache(key))
        {
            Ok(entry) => entry.map(|e| e.value),
            Err(e) => {
                warn!(key = %key, error = %e, "flow cache entry unreadable, treating as miss");
                None
            }
        }
    }
}

/// Variant assignments by `(flow key, identity)`, valid for a fixed TTL.
#[derive(Clone)]
pub struct VariantCache {
    store: Arc<dyn LocalStore>,
    ttl: chrono::Duration,
}

impl VariantCache {
    pub fn new(store: Arc<dyn LocalStore>, ttl: chrono::Duration) -> Self {
        Self { store, ttl }
    }

    pub fn put(&self, flow_key: &str, identity: &Identity, assignment: &VariantAssignment) {
        self.put_at(flow_key, identity, assignment, Utc::now());
    }

    pub fn get(&self, flow_key: &str, identity: &Identity) -> Option<VariantAssignment> {
        self.get_at(flow_key, identity, Utc::now())
    }

    /// Store `assignment`, expiring `ttl` after `now`. A TTL reaching past
    /// the representable range stores an entry that never expires.
    pub fn put_at(
        &self,
        flow_key: &str,
        identity: &Identity,
        assignment: &VariantAssignment,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            value: assignment,
            expires_at: now.checked_add_signed(self.ttl),
            owner_identity: identity.user().map(str::to_string),
        };
        let key = storage_keys::variant_cache(flow_key, identity.key());
        if let Err(e) = self.store.set_json(&key, &entry) {
            warn!(key = %key, error = %e, "variant cache write failed");
        }
    }

    /// Look up the assignment as of `now`. Expired entries and entries owned
    /// by a different user are evicted and reported as a miss.
    pub fn get_at(
        &self,
        flow_key: &str,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Option<VariantAssignment> {
        let key = storage_keys::variant_cache(flow_key, identity.key());
        let entry = match self.store.get_json::<CacheEntry<VariantAssignment>>(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "variant cache entry unreadable, treating as miss");
                self.evict(&key);
                return None;
            }
        };

        if entry.is_expired(now) {
            debug!(key = %key, "variant cache entry expired");
            self.evict(&key);
            return None;
        }
        if !entry.is_owned_by(identity.user()) {
            debug!(key = %key, "variant cache entry belongs to another user");
            self.evict(&key);
            return None;
        }
        Some(entry.value)
    }

    fn evict(&self, key: &str) {
        if let Err(e) = self.store.delete(key) {
            warn!(key = %key, error = %e, "variant cache eviction failed");
        }
    }
}

/// Receives the themes of every freshly fetched flow.
///
/// Token resolution is the rendering layer's concern; this seam only hands
/// the records over.
pub trait ThemeStore: Send + Sync {
    fn register(&self, themes: &[Theme]);

    fn get(&self, theme_id: &str) -> Option<Theme>;
}

/// Theme store persisting each theme under its id.
#[derive(Clone)]
pub struct CachedThemeStore {
    store: Arc<dyn LocalStore>,
}

impl CachedThemeStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }
}

impl ThemeStore for CachedThemeStore {
    fn register(&self, themes: &[Theme]) {
        for theme in themes {
            let entry = CacheEntry::permanent(theme);
            if let Err(e) = self
                .store
                .set_json(&storage_keys::theme_cache(&theme.id), &entry)
            {
                warn!(theme_id = %theme.id, error = %e, "theme cache write failed");
            }
        }
    }

    fn get(&self, theme_id: &str) -> Option<Theme> {
        self.store
            .get_json::<CacheEntry<Theme>>(&storage_keys::theme_cache(theme_id))
            .unwrap_or_else(|e| {
                warn!(theme_id = %theme_id, error = %e, "theme cache entry unreadable");
                None
            })
            .map(|e| e.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use onboardkit_store::MemoryStore;

    fn flow(key: &str) -> FlowPayload {
        serde_json::from_value(serde_json::json!({
            "id": "flow-1",
            "key": key,
            "version": 1,
            "versionId": "v1",
            "entryScreenId": "a",
            "screens": [{"id": "a", "kind": "intro"}],
        }))
        .unwrap()
    }

    fn active(variant: &str) -> VariantAssignment {
        VariantAssignment {
            has_active_test: true,
            experiment_id: Some("exp".to_string()),
            variant_id: Some(variant.to_string()),
            flow_version_id: Some(format!("ver-{variant}")),
        }
    }

    #[test]
    fn flow_cache_roundtrip_and_corruption() {
        let store = Arc::new(MemoryStore::new());
        let cache = FlowCache::new(store.clone());
        assert!(cache.get("welcome").is_none());

        cache.put("welcome", &flow("welcome"));
        assert_eq!(cache.get("welcome").unwrap().key, "welcome");

        store
            .set(&storage_keys::flow_cache("welcome"), b"garbage")
            .unwrap();
        assert!(cache.get("welcome").is_none());
    }

    #[test]
    fn variant_expires_after_ttl() {
        let store = Arc::new(MemoryStore::new());
        let cache = VariantCache::new(store.clone(), Duration::hours(24));
        let identity = Identity::new(None, "s-1");
        let t0 = Utc::now();

        cache.put_at("welcome", &identity, &active("b"), t0);
        assert!(cache
            .get_at("welcome", &identity, t0 + Duration::hours(23))
            .is_some());
        assert!(cache
            .get_at("welcome", &identity, t0 + Duration::hours(24))
            .is_none());
        // Evicted, so even an earlier clock no longer sees it.
        assert!(cache.get_at("welcome", &identity, t0).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn unbounded_ttl_never_expires() {
        let store = Arc::new(MemoryStore::new());
        let cache = VariantCache::new(store, Duration::MAX);
        let identity = Identity::new(None, "s-1");
        let t0 = Utc::now();

        cache.put_at("welcome", &identity, &active("b"), t0);
        assert_eq!(
            cache.get_at("welcome", &identity, t0 + Duration::days(365 * 100)),
            Some(active("b"))
        );
    }

    #[test]
    fn variant_from_other_owner_is_evicted() {
        let store = Arc::new(MemoryStore::new());
        let cache = VariantCache::new(store.clone(), Duration::hours(24));
        let u1 = Identity::new(Some("u1".to_string()), "s-1");

        cache.put("welcome", &u1, &active("b"));

        let u2 = Identity::new(Some("u2".to_string()), "s-1");
        assert!(cache.get("welcome", &u2).is_none());
        assert_eq!(cache.get("welcome", &u1), Some(active("b")));

        // A record stored under u2's key but stamped with another owner is
        // stale and gets evicted on read.
        let key = storage_keys::variant_cache("welcome", "u2");
        let entry = CacheEntry {
            value: active("a"),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            owner_identity: Some("u1".to_string()),
        };
        store.set_json(&key, &entry).unwrap();

        assert!(cache.get("welcome", &u2).is_none());
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn negative_assignment_is_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = VariantCache::new(store, Duration::hours(24));
        let identity = Identity::new(None, "s-1");

        cache.put("welcome", &identity, &VariantAssignment::no_test());
        assert_eq!(
            cache.get("welcome", &identity),
            Some(VariantAssignment::no_test())
        );
    }

    #[test]
    fn themes_registered_by_id() {
        let store = Arc::new(MemoryStore::new());
        let themes = CachedThemeStore::new(store);
        themes.register(&[Theme {
            id: "dark".to_string(),
            name: Some("Dark".to_string()),
            tokens: serde_json::json!({"bg": "#000"}),
        }]);
        assert_eq!(themes.get("dark").unwrap().name.as_deref(), Some("Dark"));
        assert!(themes.get("light").is_none());
    }
}
