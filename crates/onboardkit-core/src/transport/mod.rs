//! Minimal HTTP request/response abstraction.
//!
//! A transport sends exactly one request per call and never retries;
//! retry decisions belong to the caller (the fetch coordinator falls back
//! to cache, the delivery queue applies its retry policy).

pub mod fakes;
mod http_client;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use http_client::ReqwestTransport;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A fully built request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: reqwest::Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the query parameter `name`, if present.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// A response that reached the client, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures where no HTTP response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request could not be built (bad URL, bad header). Programmer
    /// error, retrying cannot help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Request/response transport.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request. Any status code is `Ok`; `Err` means no response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(201, "").is_success());
        assert!(!HttpResponse::new(304, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = HttpRequest {
            method: Method::Get,
            url: reqwest::Url::parse("https://api.example.com/v1/flows/a?user_id=u1").unwrap(),
            headers: vec![("X-API-Key".to_string(), "secret".to_string())],
            body: None,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(request.header("x-api-key"), Some("secret"));
        assert_eq!(request.query_param("user_id").as_deref(), Some("u1"));
        assert_eq!(request.query_param("session_id"), None);
    }
}
