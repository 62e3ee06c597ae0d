//! Experiment variant assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of the A/B assignment request for one flow and identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAssignment {
    pub has_active_test: bool,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub flow_version_id: Option<String>,
}

impl VariantAssignment {
    /// The backend confirmed that no experiment is running.
    pub fn no_test() -> Self {
        Self {
            has_active_test: false,
            experiment_id: None,
            variant_id: None,
            flow_version_id: None,
        }
    }
}

/// A cached value with optional expiry and owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_identity: Option<String>,
}

impl<T> CacheEntry<T> {
    /// An entry that never expires and belongs to nobody in particular.
    pub fn permanent(value: T) -> Self {
        Self {
            value,
            expires_at: None,
            owner_identity: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Whether a lookup by `user_id` may use this entry. An absent or empty
    /// user id never invalidates.
    pub fn is_owned_by(&self, user_id: Option<&str>) -> bool {
        match user_id.filter(|u| !u.is_empty()) {
            Some(user) => self.owner_identity.as_deref() == Some(user),
            None => true,
        }
    }
}
