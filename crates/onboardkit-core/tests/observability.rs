//! Observability tests for onboardkit flow lifecycle tracing.
//!
//! These tests verify that structured tracing events are emitted for flow
//! resolution, cache fallback, navigation, and delivery outcomes.

mod common;

use common::{three_screen_flow, Env, FLOW_PATH};
use onboardkit_core::obs::{
    emit_delivery_retry, emit_event_delivered, emit_event_dropped, emit_flow_abandoned,
    emit_flow_completed, emit_transition, FlowSpan,
};
use onboardkit_core::transport::fakes::Reply;
use onboardkit_core::Method;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_transition_logs_indices() {
    emit_transition("welcome", "next", 0, 1);
    assert!(logs_contain("nav.transition"));
}

#[traced_test]
#[test]
fn test_emit_flow_outcomes() {
    emit_flow_completed("welcome", 4200, 3);
    emit_flow_abandoned("welcome", Some("goals"), 1);
    assert!(logs_contain("flow.completed"));
    assert!(logs_contain("flow.abandoned"));
}

#[traced_test]
#[test]
fn test_emit_delivery_outcomes() {
    emit_event_delivered("answer", 2);
    emit_event_dropped("answer", &"HTTP 400");
    emit_delivery_retry("flow_start", &"HTTP 503", 2000);
    assert!(logs_contain("delivery.delivered"));
    assert!(logs_contain("delivery.dropped"));
    assert!(logs_contain("delivery.retry"));
}

#[traced_test]
#[test]
fn test_flow_span_enter_creates_span() {
    let span = FlowSpan::enter("welcome");
    drop(span);
}

#[traced_test]
#[tokio::test]
async fn test_resolve_logs_fresh_and_cached() {
    let env = Env::new();
    env.transport
        .push(Method::Get, FLOW_PATH, Reply::json(200, &three_screen_flow()));
    let sdk = env.sdk();

    sdk.resolve_flow().await.unwrap();
    assert!(logs_contain("flow.resolved"));
    assert!(logs_contain("variant.resolved"));

    sdk.resolve_flow().await.unwrap();
    assert!(logs_contain("flow.cache_fallback"));
    sdk.shutdown().await;
}
