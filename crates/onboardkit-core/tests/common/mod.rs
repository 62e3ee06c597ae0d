//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use onboardkit_core::transport::fakes::{Reply, ScriptedTransport};
use onboardkit_core::{DeliveryConfig, Method, Onboarding, SdkConfig};
use onboardkit_store::{LocalStore, MemoryStore};
use serde_json::{json, Value};

pub const BASE_URL: &str = "https://api.onboard.test";
pub const FLOW_PATH: &str = "/v1/flows/welcome";
pub const VARIANT_PATH: &str = "/v1/flows/welcome/variant";
pub const EVENTS_PATH: &str = "/v1/events";

/// Short delays so paused-clock tests advance quickly.
pub fn fast_delivery() -> DeliveryConfig {
    DeliveryConfig {
        drain_interval_ms: 5,
        retry_delay_ms: 100,
        backoff_base_ms: 50,
        max_backoff_ms: 1_000,
        rate_limit_multiplier: 2,
    }
}

pub fn config() -> SdkConfig {
    SdkConfig::new("test-key", BASE_URL)
        .with_flow_key("welcome")
        .with_delivery(fast_delivery())
}

/// A three screen flow with no theme overrides.
pub fn three_screen_flow() -> Value {
    json!({
        "id": "flow-1",
        "key": "welcome",
        "version": 3,
        "versionId": "ver-3",
        "entryScreenId": "intro",
        "defaultThemeId": "light",
        "screens": [
            {"id": "intro", "kind": "intro"},
            {"id": "goals", "kind": "multi_select"},
            {"id": "done", "kind": "outro"}
        ],
        "themes": [{"id": "light", "name": "Light", "tokens": {"bg": "#fff"}}]
    })
}

pub fn active_variant(variant_id: &str) -> Value {
    json!({
        "hasActiveTest": true,
        "experimentId": "exp-onboarding",
        "variantId": variant_id,
        "flowVersionId": format!("ver-3-{variant_id}")
    })
}

pub struct Env {
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
}

impl Env {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            transport: Arc::new(ScriptedTransport::new()),
        }
    }

    /// Flow and "no experiment" are served on every request.
    pub fn serve_flow(&self) {
        self.transport
            .set_fallback(Method::Get, FLOW_PATH, Reply::json(200, &three_screen_flow()));
        self.transport
            .set_fallback(Method::Get, VARIANT_PATH, Reply::status(404));
    }

    pub fn accept_events(&self) {
        self.transport
            .set_fallback(Method::Post, EVENTS_PATH, Reply::status(200));
    }

    pub fn sdk(&self) -> Onboarding {
        let store: Arc<dyn LocalStore> = self.store.clone();
        Onboarding::new(config(), store, self.transport.clone()).unwrap()
    }

    /// Event types of delivered (or attempted) POSTs, in send order.
    pub fn posted_event_types(&self) -> Vec<String> {
        self.transport
            .requests_to(Method::Post, EVENTS_PATH)
            .iter()
            .map(|request| {
                let body: Value =
                    serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap();
                body["eventType"].as_str().unwrap_or_default().to_string()
            })
            .collect()
    }
}
