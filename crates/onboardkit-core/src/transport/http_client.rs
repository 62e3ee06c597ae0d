//! `reqwest`-backed transport.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
use crate::domain::{OnboardError, Result};

/// Transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the onboardkit user agent.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("onboardkit/{}", crate::VERSION))
            .build()
            .map_err(|e| OnboardError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (custom TLS, proxies, pools).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(status, bytes = body.len(), "response received");

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_client() {
        assert!(ReqwestTransport::new().is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        let transport = ReqwestTransport::new().unwrap();
        let request = HttpRequest {
            method: Method::Get,
            url: reqwest::Url::parse("http://127.0.0.1:9/v1/flows/active").unwrap(),
            headers: vec![("X-API-Key".to_string(), "k".to_string())],
            body: None,
            timeout: std::time::Duration::from_secs(2),
        };
        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connection(_) | TransportError::Timeout
        ));
    }
}
