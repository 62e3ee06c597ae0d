//! Request builders for the backend endpoints.

use reqwest::Url;

use crate::config::SdkConfig;
use crate::domain::{AnalyticsEvent, OnboardError, Result};
use crate::session::Identity;
use crate::transport::{HttpRequest, Method};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Lookup alias used when no flow key is configured.
pub const ACTIVE_FLOW_ALIAS: &str = "active";

/// Builds authenticated requests against one backend.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
    api_key: String,
    timeout: std::time::Duration,
}

impl Endpoints {
    pub fn new(config: &SdkConfig) -> Result<Self> {
        config.validate()?;
        let base = Url::parse(&config.base_url)
            .map_err(|e| OnboardError::InvalidRequest(format!("base url: {e}")))?;
        Ok(Self {
            base,
            api_key: config.api_key.clone(),
            timeout: config.request_timeout(),
        })
    }

    /// `GET v1/flows/{key}` or `GET v1/flows/active`.
    pub fn flow(&self, flow_key: Option<&str>, identity: &Identity) -> Result<HttpRequest> {
        let mut url = self.url(&["v1", "flows", flow_key.unwrap_or(ACTIVE_FLOW_ALIAS)])?;
        if let Some(user) = identity.user() {
            url.query_pairs_mut().append_pair("user_id", user);
        }
        Ok(self.request(Method::Get, url, None))
    }

    /// `GET v1/flows/{key}/variant`.
    pub fn variant(&self, flow_key: &str, identity: &Identity) -> Result<HttpRequest> {
        let mut url = self.url(&["v1", "flows", flow_key, "variant"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("session_id", &identity.session_id);
            if let Some(user) = identity.user() {
                query.append_pair("user_id", user);
            }
        }
        Ok(self.request(Method::Get, url, None))
    }

    /// `POST v1/events` with one JSON event.
    pub fn event(&self, event: &AnalyticsEvent) -> Result<HttpRequest> {
        let url = self.url(&["v1", "events"])?;
        let body = serde_json::to_vec(event)
            .map_err(|e| OnboardError::InvalidRequest(format!("event body: {e}")))?;
        Ok(self.request(Method::Post, url, Some(body)))
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| OnboardError::InvalidRequest(format!("base url {} has no path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> HttpRequest {
        let mut headers = vec![
            (API_KEY_HEADER.to_string(), self.api_key.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: self.timeout,
        }
    }
}
