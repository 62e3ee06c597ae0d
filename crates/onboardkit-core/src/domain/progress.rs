//! Persisted navigation progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answer::ValueMap;

/// Progress of one identity through one flow.
///
/// Written to the local store after every mutation so that a restarted
/// process resumes on the same screen with the same answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub flow_key: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub current_screen_id: Option<String>,
    #[serde(default)]
    pub current_screen_index: Option<usize>,
    pub total_screens: usize,
    #[serde(default)]
    pub answers: ValueMap,
    #[serde(default)]
    pub attributes: ValueMap,
    #[serde(default)]
    pub screens_completed: u32,
    pub started_at: DateTime<Utc>,
}

impl NavigationState {
    pub fn new(flow_key: impl Into<String>, user_id: Option<String>, total_screens: usize) -> Self {
        Self {
            flow_key: flow_key.into(),
            user_id,
            current_screen_id: None,
            current_screen_index: None,
            total_screens,
            answers: ValueMap::new(),
            attributes: ValueMap::new(),
            screens_completed: 0,
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the flow was first started, across resumes.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Snapshot handed to the caller when a flow completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    pub flow_id: String,
    pub variant_id: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub answers: ValueMap,
}

/// Snapshot handed to the caller when the user leaves a flow early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitResult {
    pub flow_id: String,
    pub last_screen_id: Option<String>,
    pub screens_completed: u32,
    pub exited_at: DateTime<Utc>,
}
