//! Atomic counters for the delivery queue.
//!
//! Counters are incremented silently at the call site. Call
//! [`DeliveryMetrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. on shutdown).

use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight atomic counters, one set per queue.
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
}

impl DeliveryMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            retried: AtomicU64::new(0),
        }
    }

    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_enqueued", "counter incremented");
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_delivered", "counter incremented");
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_dropped", "counter incremented");
    }

    pub fn inc_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "delivery_retries", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_enqueued = self.enqueued(),
            events_delivered = self.delivered(),
            events_dropped = self.dropped(),
            delivery_retries = self.retried(),
        );
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let m = DeliveryMetrics::new();
        assert_eq!(m.delivered(), 0);
        m.inc_enqueued();
        m.inc_enqueued();
        m.inc_delivered();
        m.inc_retried();
        assert_eq!(m.enqueued(), 2);
        assert_eq!(m.delivered(), 1);
        assert_eq!(m.retried(), 1);
        assert_eq!(m.dropped(), 0);
        m.flush();
    }
}
