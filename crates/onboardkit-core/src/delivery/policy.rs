//! Retry classification and backoff for event delivery.

use std::fmt;
use std::time::Duration;

use crate::config::DeliveryConfig;
use crate::transport::{HttpResponse, TransportError};

/// What to do with the head event after one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the backend. Remove.
    Delivered,
    /// Can never succeed. Remove.
    Drop(DropReason),
    /// Keep at the head and try again later.
    Retry(RetryReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    BadRequest,
    Unauthorized,
    InvalidRequest(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::BadRequest => f.write_str("HTTP 400"),
            DropReason::Unauthorized => f.write_str("HTTP 401"),
            DropReason::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    Transport(String),
    RateLimited,
    ServerError(u16),
    UnexpectedStatus(u16),
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Transport(msg) => write!(f, "transport: {msg}"),
            RetryReason::RateLimited => f.write_str("HTTP 429"),
            RetryReason::ServerError(status) | RetryReason::UnexpectedStatus(status) => {
                write!(f, "HTTP {status}")
            }
        }
    }
}

/// Classify the result of one delivery attempt.
pub fn classify(result: &Result<HttpResponse, TransportError>) -> DeliveryOutcome {
    match result {
        Ok(response) if response.is_success() => DeliveryOutcome::Delivered,
        Ok(response) => match response.status {
            400 => DeliveryOutcome::Drop(DropReason::BadRequest),
            401 => DeliveryOutcome::Drop(DropReason::Unauthorized),
            429 => DeliveryOutcome::Retry(RetryReason::RateLimited),
            status @ 500..=599 => DeliveryOutcome::Retry(RetryReason::ServerError(status)),
            status => DeliveryOutcome::Retry(RetryReason::UnexpectedStatus(status)),
        },
        Err(TransportError::InvalidRequest(msg)) => {
            DeliveryOutcome::Drop(DropReason::InvalidRequest(msg.clone()))
        }
        Err(err) => DeliveryOutcome::Retry(RetryReason::Transport(err.to_string())),
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    drain_interval: Duration,
    retry_delay: Duration,
    backoff_base: Duration,
    max_backoff: Duration,
    rate_limit_multiplier: u32,
}

impl RetryPolicy {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            drain_interval: config.drain_interval(),
            retry_delay: config.retry_delay(),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            rate_limit_multiplier: config.rate_limit_multiplier.max(1),
        }
    }

    /// Pause before attempting the next event after a terminal outcome.
    pub fn drain_interval(&self) -> Duration {
        self.drain_interval
    }

    /// Pause before retrying the head event after its `failures`-th
    /// consecutive failure (1-based).
    pub fn delay_for(&self, reason: &RetryReason, failures: u32) -> Duration {
        match reason {
            RetryReason::Transport(_) | RetryReason::UnexpectedStatus(_) => self.retry_delay,
            RetryReason::ServerError(_) => self.backoff(failures, 1),
            RetryReason::RateLimited => self.backoff(failures, self.rate_limit_multiplier),
        }
    }

    fn backoff(&self, failures: u32, multiplier: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let delay = self
            .backoff_base
            .saturating_mul(1u32 << exponent)
            .saturating_mul(multiplier);
        delay.min(self.max_backoff)
    }
}
