//! `Onboarding`: the entry point host applications hold on to.

use std::path::Path;
use std::sync::Arc;

use onboardkit_store::{FsStore, LocalStore};
use tracing::info;

use crate::api::Endpoints;
use crate::cache::{CachedThemeStore, FlowCache, ThemeStore, VariantCache};
use crate::config::SdkConfig;
use crate::delivery::DeliveryQueue;
use crate::domain::{ResolvedFlow, Result};
use crate::fetch::FlowFetcher;
use crate::navigation::NavigationMachine;
use crate::session::{Identity, SessionState};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Wires configuration, storage and transport into the SDK services.
///
/// Services are owned by this struct and shared with the navigation
/// machines it starts; there is no global state.
pub struct Onboarding {
    config: SdkConfig,
    store: Arc<dyn LocalStore>,
    session: Arc<SessionState>,
    themes: Arc<dyn ThemeStore>,
    fetcher: FlowFetcher,
    queue: Arc<DeliveryQueue>,
}

impl Onboarding {
    /// Validate `config` and start the delivery queue over `store`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: SdkConfig,
        store: Arc<dyn LocalStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let endpoints = Endpoints::new(&config)?;

        let session = Arc::new(SessionState::new(Arc::clone(&store)));
        if let Some(user_id) = &config.user_id {
            session.set_user_id(Some(user_id.clone()))?;
        }

        let themes: Arc<dyn ThemeStore> = Arc::new(CachedThemeStore::new(Arc::clone(&store)));
        let fetcher = FlowFetcher::new(
            endpoints.clone(),
            Arc::clone(&transport),
            FlowCache::new(Arc::clone(&store)),
            VariantCache::new(Arc::clone(&store), config.variant_ttl()),
            Arc::clone(&themes),
            Arc::clone(&session),
            config.flow_key.clone(),
        );
        let queue = Arc::new(DeliveryQueue::spawn(
            Arc::clone(&store),
            transport,
            endpoints,
            &config.delivery,
        ));

        info!(
            base_url = %config.base_url,
            flow_key = ?config.flow_key,
            namespace = %config.namespace,
            "onboarding initialised"
        );
        Ok(Self {
            config,
            store,
            session,
            themes,
            fetcher,
            queue,
        })
    }

    /// Production wiring: files under `root`, HTTP via reqwest.
    pub fn open(config: SdkConfig, root: impl AsRef<Path>) -> Result<Self> {
        let store = FsStore::with_namespace(root, &config.namespace)?;
        let transport = ReqwestTransport::new()?;
        Self::new(config, Arc::new(store), Arc::new(transport))
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Fetch the configured flow for the current identity.
    pub async fn resolve_flow(&self) -> Result<ResolvedFlow> {
        let identity = self.session.identity();
        self.fetcher.resolve_flow(&identity).await
    }

    /// Begin (or resume) navigating `flow`.
    pub async fn start(&self, flow: ResolvedFlow) -> Result<NavigationMachine> {
        NavigationMachine::start(
            Arc::new(flow),
            Arc::clone(&self.store),
            Arc::clone(&self.session),
            Arc::clone(&self.queue),
        )
        .await
    }

    pub fn identity(&self) -> Identity {
        self.session.identity()
    }

    /// Change the user the SDK acts for. Cached variants and progress are
    /// keyed by user, so the next resolve starts from that user's records.
    pub fn set_user_id(&self, user_id: Option<String>) -> Result<()> {
        self.session.set_user_id(user_id)
    }

    pub fn reset_session(&self) -> String {
        self.session.reset_session()
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn themes(&self) -> &dyn ThemeStore {
        self.themes.as_ref()
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    /// Stop background delivery. Pending events stay persisted.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OnboardError;
    use crate::transport::fakes::ScriptedTransport;
    use onboardkit_store::MemoryStore;

    #[tokio::test]
    async fn rejects_missing_credentials() {
        let result = Onboarding::new(
            SdkConfig::new("", "https://api.test"),
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedTransport::new()),
        );
        assert!(matches!(result, Err(OnboardError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn configured_user_is_sticky_and_optional() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());

        let sdk = Onboarding::new(
            SdkConfig::new("key", "https://api.test").with_user_id("u1"),
            store.clone(),
            transport.clone(),
        )
        .unwrap();
        assert_eq!(sdk.identity().user_id.as_deref(), Some("u1"));
        sdk.shutdown().await;

        // No user in config: the persisted one is kept.
        let sdk = Onboarding::new(SdkConfig::new("key", "https://api.test"), store, transport)
            .unwrap();
        assert_eq!(sdk.identity().user_id.as_deref(), Some("u1"));
        sdk.shutdown().await;
    }

    #[tokio::test]
    async fn open_uses_namespaced_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = SdkConfig::new("key", "https://api.test").with_namespace("demo");
        let sdk = Onboarding::open(config, dir.path()).unwrap();
        let session_id = sdk.identity().session_id;
        sdk.shutdown().await;

        assert!(dir.path().join("demo").is_dir());
        let reopened =
            Onboarding::open(SdkConfig::new("key", "https://api.test").with_namespace("demo"), dir.path())
                .unwrap();
        assert_eq!(reopened.identity().session_id, session_id);
        reopened.shutdown().await;
    }
}
