//! Scripted in-memory transport (testing only)
//!
//! `ScriptedTransport` answers requests from per-route scripts without any
//! network. A route is a method plus URL path; queued replies are consumed
//! in order, after which the route's fallback reply is used. Unscripted
//! routes fail with a connection error, which makes "network down" the
//! default state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// A canned reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Status(u16, Vec<u8>),
    Fail(TransportError),
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Reply::Status(status, Vec::new())
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Reply::Status(status, body.to_string().into_bytes())
    }

    pub fn offline() -> Self {
        Reply::Fail(TransportError::Connection("network unreachable".to_string()))
    }
}

#[derive(Debug, Default)]
struct Route {
    queued: VecDeque<Reply>,
    fallback: Option<Reply>,
}

#[derive(Debug, Default)]
struct Script {
    routes: HashMap<(Method, String), Route>,
    log: Vec<HttpRequest>,
}

/// In-memory transport driven by scripted replies.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot reply for `method path`.
    pub fn push(&self, method: Method, path: &str, reply: Reply) {
        self.lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .queued
            .push_back(reply);
    }

    /// Reply used for `method path` once its queue is empty.
    pub fn set_fallback(&self, method: Method, path: &str, reply: Reply) {
        self.lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .fallback = Some(reply);
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().log.clone()
    }

    /// Requests sent to `method path`, in order.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.lock()
            .log
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.lock();
        let key = (request.method, request.url.path().to_string());
        script.log.push(request);

        let reply = script.routes.get_mut(&key).and_then(|route| {
            route
                .queued
                .pop_front()
                .or_else(|| route.fallback.clone())
        });

        match reply.unwrap_or_else(Reply::offline) {
            Reply::Status(status, body) => Ok(HttpResponse { status, body }),
            Reply::Fail(err) => Err(err),
        }
    }
}
