//! Flow fetch coordinator.
//!
//! Resolves a flow for the current identity: network first, falling back
//! to the last cached copy when the backend is unreachable or refuses the
//! request, then attaches the identity's experiment assignment.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::api::{Endpoints, ACTIVE_FLOW_ALIAS};
use crate::cache::{FlowCache, ThemeStore, VariantCache};
use crate::domain::{FlowPayload, OnboardError, ResolvedFlow, Result, VariantAssignment};
use crate::obs;
use crate::session::{AnalyticsContext, Identity, SessionState};
use crate::transport::{HttpResponse, HttpTransport};

/// Where a variant assignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariantSource {
    Cache,
    Network,
    Unavailable,
}

impl VariantSource {
    fn as_str(self) -> &'static str {
        match self {
            VariantSource::Cache => "cache",
            VariantSource::Network => "network",
            VariantSource::Unavailable => "unavailable",
        }
    }
}

/// Fetches flows and variant assignments, maintaining their caches.
pub struct FlowFetcher {
    endpoints: Endpoints,
    transport: Arc<dyn HttpTransport>,
    flows: FlowCache,
    variants: VariantCache,
    themes: Arc<dyn ThemeStore>,
    session: Arc<SessionState>,
    flow_key: Option<String>,
}

impl FlowFetcher {
    pub fn new(
        endpoints: Endpoints,
        transport: Arc<dyn HttpTransport>,
        flows: FlowCache,
        variants: VariantCache,
        themes: Arc<dyn ThemeStore>,
        session: Arc<SessionState>,
        flow_key: Option<String>,
    ) -> Self {
        Self {
            endpoints,
            transport,
            flows,
            variants,
            themes,
            session,
            flow_key,
        }
    }

    /// Key the flow is cached under before its canonical key is known.
    pub fn lookup_key(&self) -> &str {
        self.flow_key.as_deref().unwrap_or(ACTIVE_FLOW_ALIAS)
    }

    /// Resolve the configured flow for `identity`.
    ///
    /// Transport failures and non-2xx responses are served from the flow
    /// cache when possible. A response that does not decode is always an
    /// error. The variant lookup never fails the call.
    #[instrument(skip(self, identity), fields(lookup_key = %self.lookup_key()))]
    pub async fn resolve_flow(&self, identity: &Identity) -> Result<ResolvedFlow> {
        let lookup_key = self.lookup_key().to_string();
        let request = self.endpoints.flow(self.flow_key.as_deref(), identity)?;

        let response = self.transport.send(request).await;
        let payload = match response {
            Ok(response) if response.is_success() => FlowPayload::decode(&response.body)?,
            Ok(HttpResponse { status, .. }) => {
                let err = if status == 404 {
                    OnboardError::NotFound(format!("flow {lookup_key}"))
                } else {
                    OnboardError::Http { status }
                };
                return self.from_cache(&lookup_key, identity, err);
            }
            Err(e) => {
                let err = OnboardError::from(e);
                if matches!(err, OnboardError::InvalidRequest(_)) {
                    return Err(err);
                }
                return self.from_cache(&lookup_key, identity, err);
            }
        };

        self.flows.put(&payload.key, &payload);
        if payload.key != lookup_key {
            self.flows.put(&lookup_key, &payload);
        }
        self.themes.register(&payload.themes);

        let (variant, source) = self.resolve_variant(&payload.key, identity).await;
        obs::emit_variant_resolved(
            &payload.key,
            variant.as_ref().map(|v| v.has_active_test),
            source.as_str(),
        );

        let flow = ResolvedFlow::new(payload, variant);
        self.apply_context(&flow);
        obs::emit_flow_resolved(&flow.flow_key, flow.version, false);
        Ok(flow)
    }

    fn from_cache(
        &self,
        lookup_key: &str,
        identity: &Identity,
        err: OnboardError,
    ) -> Result<ResolvedFlow> {
        let Some(payload) = self.flows.get(lookup_key) else {
            warn!(lookup_key = %lookup_key, error = %err, "flow unavailable and not cached");
            return Err(err);
        };
        obs::emit_flow_cache_fallback(lookup_key, &err);

        let variant = self.variants.get(&payload.key, identity);
        let source = if variant.is_some() {
            VariantSource::Cache
        } else {
            VariantSource::Unavailable
        };
        obs::emit_variant_resolved(
            &payload.key,
            variant.as_ref().map(|v| v.has_active_test),
            source.as_str(),
        );

        let flow = ResolvedFlow::new(payload, variant);
        self.apply_context(&flow);
        obs::emit_flow_resolved(&flow.flow_key, flow.version, true);
        Ok(flow)
    }

    async fn resolve_variant(
        &self,
        flow_key: &str,
        identity: &Identity,
    ) -> (Option<VariantAssignment>, VariantSource) {
        if let Some(cached) = self.variants.get(flow_key, identity) {
            return (Some(cached), VariantSource::Cache);
        }

        let request = match self.endpoints.variant(flow_key, identity) {
            Ok(request) => request,
            Err(e) => {
                warn!(flow_key = %flow_key, error = %e, "variant request could not be built");
                return (None, VariantSource::Unavailable);
            }
        };

        let assignment = match self.transport.send(request).await {
            Ok(response) if response.status == 404 => VariantAssignment::no_test(),
            Ok(response) if response.is_success() => {
                match serde_json::from_slice::<VariantAssignment>(&response.body) {
                    Ok(assignment) => assignment,
                    Err(e) => {
                        warn!(flow_key = %flow_key, error = %e, "variant response did not decode");
                        return (None, VariantSource::Unavailable);
                    }
                }
            }
            Ok(response) => {
                debug!(flow_key = %flow_key, status = response.status, "variant request refused");
                return (None, VariantSource::Unavailable);
            }
            Err(e) => {
                debug!(flow_key = %flow_key, error = %e, "variant request failed");
                return (None, VariantSource::Unavailable);
            }
        };

        self.variants.put(flow_key, identity, &assignment);
        (Some(assignment), VariantSource::Network)
    }

    fn apply_context(&self, flow: &ResolvedFlow) {
        let test = flow.active_test();
        self.session.set_context(AnalyticsContext {
            flow_id: Some(flow.flow_id.clone()),
            flow_version_id: Some(flow.analytics_version_id()),
            experiment_id: test.and_then(|v| v.experiment_id.clone()),
            variant_id: test.and_then(|v| v.variant_id.clone()),
        });
    }
}
