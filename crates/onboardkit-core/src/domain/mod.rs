//! Domain models for onboardkit.
//!
//! Canonical definitions for the core entities:
//! - `ResolvedFlow`: a flow merged with its experiment assignment
//! - `VariantAssignment` / `CacheEntry`: A/B assignment and cache envelope
//! - `NavigationState`: persisted progress through a flow
//! - `AnalyticsEvent`: telemetry delivered by the delivery queue
//! - `AnswerValue`: the closed value union for answers and event data

pub mod answer;
pub mod error;
pub mod event;
pub mod flow;
pub mod progress;
pub mod variant;

pub use answer::{AnswerValue, ValueMap};
pub use error::{OnboardError, Result, ValueError};
pub use event::{AnalyticsEvent, AnalyticsEventBuilder, EventType};
pub use flow::{FlowPayload, ResolvedFlow, Screen, Theme};
pub use progress::{CompletionResult, ExitResult, NavigationState};
pub use variant::{CacheEntry, VariantAssignment};
