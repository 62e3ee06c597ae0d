//! onboardkit Core Library
//!
//! Client-side runtime for remotely configured onboarding flows: fetches
//! flows and experiment assignments with cache fallback, drives resumable
//! navigation, and delivers analytics events through a durable queue.

pub mod api;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod fetch;
pub mod metrics;
pub mod navigation;
pub mod obs;
pub mod sdk;
pub mod session;
pub mod storage_keys;
pub mod telemetry;
pub mod transport;

pub use api::{Endpoints, ACTIVE_FLOW_ALIAS, API_KEY_HEADER};
pub use cache::{CachedThemeStore, FlowCache, ThemeStore, VariantCache};
pub use config::{DeliveryConfig, SdkConfig, MAX_VARIANT_TTL_SECS};
pub use delivery::{DeliveryOutcome, DeliveryQueue, DropReason, RetryPolicy, RetryReason};
pub use domain::{
    AnalyticsEvent, AnalyticsEventBuilder, AnswerValue, CacheEntry, CompletionResult, EventType,
    ExitResult, FlowPayload, NavigationState, OnboardError, ResolvedFlow, Result, Screen, Theme,
    ValueError, ValueMap, VariantAssignment,
};
pub use fetch::FlowFetcher;
pub use metrics::DeliveryMetrics;
pub use navigation::{Action, FlowListener, NavigationMachine, Position, Progress, Transition};
pub use sdk::Onboarding;
pub use session::{AnalyticsContext, Identity, SessionState};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, TransportError};

pub use onboardkit_store::{FsStore, LocalStore, LocalStoreExt, MemoryStore, StorageError};

/// Crate version reported in the user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
