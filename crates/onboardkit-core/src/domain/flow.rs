//! Flow payloads as served by the backend and the resolved, immutable form
//! handed to callers.

use serde::{Deserialize, Serialize};

use super::error::{OnboardError, Result};
use super::variant::VariantAssignment;

/// One screen of a flow. Blocks are opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub theme_id: Option<String>,
    #[serde(default)]
    pub blocks: Vec<serde_json::Value>,
    #[serde(default)]
    pub spacing: Option<f64>,
}

/// A theme record. Token resolution happens in the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tokens: serde_json::Value,
}

/// Flow document returned by `GET /v1/flows/...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPayload {
    pub id: String,
    pub key: String,
    pub version: u32,
    /// Identifier of the published version, used as analytics context
    /// when no experiment is running.
    pub version_id: String,
    pub entry_screen_id: String,
    #[serde(default)]
    pub default_theme_id: Option<String>,
    pub screens: Vec<Screen>,
    #[serde(default)]
    pub themes: Vec<Theme>,
}

impl FlowPayload {
    /// Decode and validate a payload from raw response bytes.
    ///
    /// A payload that parses but has no screens, or repeats a screen id,
    /// is rejected: the navigation machine needs at least one addressable
    /// screen.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let payload: FlowPayload = serde_json::from_slice(bytes)?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        if self.screens.is_empty() {
            return Err(OnboardError::Decode(format!(
                "flow {} has no screens",
                self.key
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for screen in &self.screens {
            if !seen.insert(screen.id.as_str()) {
                return Err(OnboardError::Decode(format!(
                    "flow {} repeats screen id {}",
                    self.key, screen.id
                )));
            }
        }
        Ok(())
    }
}

/// A flow merged with its experiment assignment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFlow {
    pub flow_id: String,
    pub flow_key: String,
    pub version: u32,
    pub version_id: String,
    pub entry_screen_id: String,
    pub default_theme_id: Option<String>,
    pub screens: Vec<Screen>,
    pub themes: Vec<Theme>,
    /// `None` when the assignment is unknown (variant fetch failed and
    /// nothing cached). `Some` with `has_active_test == false` when the
    /// backend confirmed there is no experiment.
    pub active_variant: Option<VariantAssignment>,
}

impl ResolvedFlow {
    pub fn new(payload: FlowPayload, active_variant: Option<VariantAssignment>) -> Self {
        Self {
            flow_id: payload.id,
            flow_key: payload.key,
            version: payload.version,
            version_id: payload.version_id,
            entry_screen_id: payload.entry_screen_id,
            default_theme_id: payload.default_theme_id,
            screens: payload.screens,
            themes: payload.themes,
            active_variant,
        }
    }

    /// Index of the screen with `id`.
    pub fn screen_index(&self, id: &str) -> Option<usize> {
        self.screens.iter().position(|s| s.id == id)
    }

    /// Index the flow starts at: the entry screen, or the first screen when
    /// the entry id does not match any screen.
    pub fn entry_index(&self) -> usize {
        self.screen_index(&self.entry_screen_id).unwrap_or(0)
    }

    /// Flow version the analytics context should report.
    pub fn analytics_version_id(&self) -> String {
        self.active_variant
            .as_ref()
            .filter(|v| v.has_active_test)
            .and_then(|v| v.flow_version_id.clone())
            .unwrap_or_else(|| self.version_id.clone())
    }

    /// The active experiment, if one is running.
    pub fn active_test(&self) -> Option<&VariantAssignment> {
        self.active_variant.as_ref().filter(|v| v.has_active_test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_json() -> serde_json::Value {
        json!({
            "id": "flow-1",
            "key": "welcome",
            "version": 4,
            "versionId": "ver-4",
            "entryScreenId": "b",
            "screens": [
                {"id": "a", "kind": "intro", "blocks": [{"type": "header", "text": "Hi"}]},
                {"id": "b", "kind": "question"},
            ],
            "themes": [{"id": "dark", "tokens": {"bg": "#000"}}]
        })
    }

    #[test]
    fn decode_valid_payload() {
        let bytes = serde_json::to_vec(&payload_json()).unwrap();
        let payload = FlowPayload::decode(&bytes).unwrap();
        assert_eq!(payload.key, "welcome");
        assert_eq!(payload.screens.len(), 2);
        assert_eq!(payload.screens[0].blocks.len(), 1);
        assert_eq!(payload.themes[0].id, "dark");
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let err = FlowPayload::decode(br#"{"id": "flow-1"}"#).unwrap_err();
        assert!(matches!(err, OnboardError::Decode(_)));
    }

    #[test]
    fn decode_rejects_empty_screens() {
        let mut value = payload_json();
        value["screens"] = json!([]);
        let err = FlowPayload::decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, OnboardError::Decode(msg) if msg.contains("no screens")));
    }

    #[test]
    fn decode_rejects_duplicate_screen_ids() {
        let mut value = payload_json();
        value["screens"] = json!([{"id": "a", "kind": "x"}, {"id": "a", "kind": "y"}]);
        let err = FlowPayload::decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, OnboardError::Decode(_)));
    }

    #[test]
    fn entry_index_falls_back_to_zero() {
        let bytes = serde_json::to_vec(&payload_json()).unwrap();
        let mut payload = FlowPayload::decode(&bytes).unwrap();
        assert_eq!(ResolvedFlow::new(payload.clone(), None).entry_index(), 1);

        payload.entry_screen_id = "missing".to_string();
        assert_eq!(ResolvedFlow::new(payload, None).entry_index(), 0);
    }

    #[test]
    fn analytics_version_prefers_active_variant() {
        let bytes = serde_json::to_vec(&payload_json()).unwrap();
        let payload = FlowPayload::decode(&bytes).unwrap();

        let base = ResolvedFlow::new(payload.clone(), Some(VariantAssignment::no_test()));
        assert_eq!(base.analytics_version_id(), "ver-4");

        let variant = VariantAssignment {
            has_active_test: true,
            experiment_id: Some("exp-1".to_string()),
            variant_id: Some("var-b".to_string()),
            flow_version_id: Some("ver-5b".to_string()),
        };
        let tested = ResolvedFlow::new(payload, Some(variant));
        assert_eq!(tested.analytics_version_id(), "ver-5b");
        assert_eq!(
            tested.active_test().and_then(|v| v.variant_id.as_deref()),
            Some("var-b")
        );
    }
}
