//! Analytics events delivered to the backend.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::answer::{AnswerValue, ValueMap};

/// Classification of an analytics event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FlowStart,
    FlowResumed,
    ScreenView,
    ScreenTransition,
    Answer,
    FlowComplete,
    FlowAbandoned,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FlowStart => "flow_start",
            EventType::FlowResumed => "flow_resumed",
            EventType::ScreenView => "screen_view",
            EventType::ScreenTransition => "screen_transition",
            EventType::Answer => "answer",
            EventType::FlowComplete => "flow_complete",
            EventType::FlowAbandoned => "flow_abandoned",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single analytics event. Built once at enqueue time and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Client-generated id so the backend can de-duplicate redeliveries.
    pub event_id: Uuid,
    pub flow_id: Option<String>,
    pub flow_version_id: Option<String>,
    pub experiment_id: Option<String>,
    pub variant_id: Option<String>,
    pub event_type: EventType,
    pub event_data: ValueMap,
    pub user_id: Option<String>,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    /// Start building an event of `event_type` for `session_id`.
    pub fn builder(event_type: EventType, session_id: impl Into<String>) -> AnalyticsEventBuilder {
        AnalyticsEventBuilder {
            event: AnalyticsEvent {
                event_id: Uuid::new_v4(),
                flow_id: None,
                flow_version_id: None,
                experiment_id: None,
                variant_id: None,
                event_type,
                event_data: ValueMap::new(),
                user_id: None,
                session_id: session_id.into(),
                timestamp: Utc::now(),
            },
        }
    }
}

/// Builder for [`AnalyticsEvent`]; `build` freezes the event.
#[derive(Debug, Clone)]
pub struct AnalyticsEventBuilder {
    event: AnalyticsEvent,
}

impl AnalyticsEventBuilder {
    pub fn flow_id(mut self, flow_id: Option<String>) -> Self {
        self.event.flow_id = flow_id;
        self
    }

    pub fn flow_version_id(mut self, version_id: Option<String>) -> Self {
        self.event.flow_version_id = version_id;
        self
    }

    pub fn experiment(mut self, experiment_id: Option<String>, variant_id: Option<String>) -> Self {
        self.event.experiment_id = experiment_id;
        self.event.variant_id = variant_id;
        self
    }

    pub fn user_id(mut self, user_id: Option<String>) -> Self {
        self.event.user_id = user_id;
        self
    }

    /// Attach a data field. Values that cannot be encoded as JSON
    /// (non-finite numbers) are left out so the event stays readable.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<AnswerValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match value.validate() {
            Ok(()) => {
                self.event.event_data.insert(key, value);
            }
            Err(e) => warn!(key = %key, error = %e, "dropping unencodable event data field"),
        }
        self
    }

    pub fn build(self) -> AnalyticsEvent {
        self.event
    }
}
