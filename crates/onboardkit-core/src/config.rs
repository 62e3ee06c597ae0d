//! SDK configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{OnboardError, Result};

/// Longest accepted variant cache TTL, ten years.
pub const MAX_VARIANT_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Delivery queue timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Pause between two consecutive delivery attempts (milliseconds).
    pub drain_interval_ms: u64,
    /// Delay before retrying after a transport failure or an unclassified
    /// status (milliseconds).
    pub retry_delay_ms: u64,
    /// Base delay for exponential backoff on 5xx and 429 (milliseconds).
    pub backoff_base_ms: u64,
    /// Upper bound for any backoff delay (milliseconds).
    pub max_backoff_ms: u64,
    /// Extra factor applied to the backoff when the server rate-limits.
    pub rate_limit_multiplier: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            drain_interval_ms: 100,
            retry_delay_ms: 2_000,
            backoff_base_ms: 1_000,
            max_backoff_ms: 60_000,
            rate_limit_multiplier: 1,
        }
    }
}

impl DeliveryConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Configuration for an [`Onboarding`](crate::Onboarding) instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SdkConfig {
    /// Credential sent as the `X-API-Key` header.
    pub api_key: String,
    /// Backend base URL, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Flow to present. `None` asks the backend for the app's active flow.
    pub flow_key: Option<String>,
    /// Initial user id. `None` keeps whatever user id was persisted earlier.
    pub user_id: Option<String>,
    /// Local store namespace.
    pub namespace: String,
    /// Per-request timeout (milliseconds).
    pub request_timeout_ms: u64,
    /// Lifetime of a cached variant assignment (seconds).
    pub variant_ttl_secs: u64,
    pub delivery: DeliveryConfig,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            flow_key: None,
            user_id: None,
            namespace: onboardkit_store::DEFAULT_NAMESPACE.to_string(),
            request_timeout_ms: 10_000,
            variant_ttl_secs: 24 * 60 * 60,
            delivery: DeliveryConfig::default(),
        }
    }
}

impl SdkConfig {
    /// Create a configuration for the given credential and backend.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - ONBOARDKIT_API_KEY (required)
    /// - ONBOARDKIT_BASE_URL (required)
    /// - ONBOARDKIT_FLOW_KEY (optional)
    /// - ONBOARDKIT_USER_ID (optional)
    /// - ONBOARDKIT_NAMESPACE (optional, default: "onboardkit")
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ONBOARDKIT_API_KEY")
            .map_err(|_| OnboardError::NotConfigured("ONBOARDKIT_API_KEY not set".to_string()))?;
        let base_url = std::env::var("ONBOARDKIT_BASE_URL")
            .map_err(|_| OnboardError::NotConfigured("ONBOARDKIT_BASE_URL not set".to_string()))?;

        let mut config = Self::new(api_key, base_url);
        config.flow_key = std::env::var("ONBOARDKIT_FLOW_KEY").ok();
        config.user_id = std::env::var("ONBOARDKIT_USER_ID").ok();
        if let Ok(namespace) = std::env::var("ONBOARDKIT_NAMESPACE") {
            config.namespace = namespace;
        }
        Ok(config)
    }

    pub fn with_flow_key(mut self, flow_key: impl Into<String>) -> Self {
        self.flow_key = Some(flow_key.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_variant_ttl(mut self, ttl: Duration) -> Self {
        self.variant_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Variant cache TTL, clamped to [`MAX_VARIANT_TTL_SECS`].
    pub fn variant_ttl(&self) -> chrono::Duration {
        let secs = self.variant_ttl_secs.min(MAX_VARIANT_TTL_SECS) as i64;
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }

    /// Check that the credential and backend are usable.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(OnboardError::NotConfigured("api key is empty".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(OnboardError::NotConfigured("base url is empty".to_string()));
        }
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| OnboardError::InvalidRequest(format!("base url: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(OnboardError::InvalidRequest(format!(
                "base url {} cannot carry paths",
                self.base_url
            )));
        }
        if matches!(self.flow_key.as_deref(), Some(k) if k.trim().is_empty()) {
            return Err(OnboardError::InvalidRequest("flow key is empty".to_string()));
        }
        if self.variant_ttl_secs > MAX_VARIANT_TTL_SECS {
            return Err(OnboardError::InvalidRequest(format!(
                "variant ttl {}s exceeds {MAX_VARIANT_TTL_SECS}s",
                self.variant_ttl_secs
            )));
        }
        Ok(())
    }
}
