//! Structured observability hooks for flow and delivery lifecycle events.
//!
//! This module provides:
//! - Flow-scoped tracing spans via the `FlowSpan` RAII guard
//! - Emission functions for resolution, navigation and delivery outcomes
//!
//! Events are emitted at `info!` level, failures that the SDK absorbs at
//! `warn!`. Filter with `RUST_LOG` (see [`crate::telemetry::init_tracing`]).

use tracing::{info, warn};

/// RAII guard that enters a flow-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = FlowSpan::enter("welcome");
/// // tracing calls are now associated with flow_key = "welcome"
/// ```
pub struct FlowSpan {
    _span: tracing::span::EnteredSpan,
}

impl FlowSpan {
    /// Create and enter a span tagged with the flow key.
    pub fn enter(flow_key: &str) -> Self {
        let span = tracing::info_span!("onboardkit.flow", flow_key = %flow_key);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a flow was resolved, either fresh or from cache.
pub fn emit_flow_resolved(flow_key: &str, version: u32, from_cache: bool) {
    info!(
        event = "flow.resolved",
        flow_key = %flow_key,
        version = version,
        from_cache = from_cache,
    );
}

/// Emit event: the flow request failed and the cached copy is served.
pub fn emit_flow_cache_fallback(lookup_key: &str, error: &dyn std::fmt::Display) {
    warn!(event = "flow.cache_fallback", lookup_key = %lookup_key, error = %error);
}

/// Emit event: variant resolution finished.
///
/// `source` is one of `cache`, `network`, `unavailable`.
pub fn emit_variant_resolved(flow_key: &str, has_active_test: Option<bool>, source: &str) {
    info!(
        event = "variant.resolved",
        flow_key = %flow_key,
        has_active_test = ?has_active_test,
        source = %source,
    );
}

/// Emit event: the navigation machine moved between screens.
pub fn emit_transition(flow_key: &str, action: &str, from: usize, to: usize) {
    info!(
        event = "nav.transition",
        flow_key = %flow_key,
        action = %action,
        from = from,
        to = to,
    );
}

/// Emit event: flow completed.
pub fn emit_flow_completed(flow_key: &str, elapsed_ms: u64, answers: usize) {
    info!(
        event = "flow.completed",
        flow_key = %flow_key,
        elapsed_ms = elapsed_ms,
        answers = answers,
    );
}

/// Emit event: user left the flow before completing it.
pub fn emit_flow_abandoned(flow_key: &str, last_screen_id: Option<&str>, screens_completed: u32) {
    info!(
        event = "flow.abandoned",
        flow_key = %flow_key,
        last_screen_id = ?last_screen_id,
        screens_completed = screens_completed,
    );
}

/// Emit event: an analytics event reached the backend.
pub fn emit_event_delivered(event_type: &str, attempts: u32) {
    info!(event = "delivery.delivered", event_type = %event_type, attempts = attempts);
}

/// Emit event: an analytics event was discarded as undeliverable.
pub fn emit_event_dropped(event_type: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "delivery.dropped", event_type = %event_type, reason = %reason);
}

/// Emit event: delivery failed transiently and will be retried.
pub fn emit_delivery_retry(event_type: &str, reason: &dyn std::fmt::Display, delay_ms: u64) {
    warn!(
        event = "delivery.retry",
        event_type = %event_type,
        reason = %reason,
        delay_ms = delay_ms,
    );
}
