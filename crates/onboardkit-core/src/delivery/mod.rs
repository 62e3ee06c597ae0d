//! Durable, ordered analytics delivery.
//!
//! A single worker task owns the pending event list. Producers talk to it
//! through [`DeliveryQueue`], which sends commands over a channel and waits
//! for the worker's acknowledgement. An event is acknowledged only after
//! the whole list has been written to the local store, so an acknowledged
//! event survives a restart.
//!
//! The worker attempts the head event, one request at a time, and applies
//! [`policy::classify`] to the outcome. Retried events stay at the head.

pub mod policy;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, OptionFuture};
use onboardkit_store::{LocalStore, LocalStoreExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::Endpoints;
use crate::config::DeliveryConfig;
use crate::domain::{AnalyticsEvent, OnboardError, Result};
use crate::metrics::DeliveryMetrics;
use crate::obs;
use crate::storage_keys;
use crate::transport::{HttpResponse, HttpTransport, TransportError};

pub use policy::{classify, DeliveryOutcome, DropReason, RetryPolicy, RetryReason};

const COMMAND_BUFFER: usize = 64;

enum Command {
    Enqueue {
        event: Box<AnalyticsEvent>,
        ack: oneshot::Sender<Result<()>>,
    },
    Pending {
        reply: oneshot::Sender<Vec<AnalyticsEvent>>,
    },
    DrainNow {
        ack: oneshot::Sender<()>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Handle to the delivery worker.
pub struct DeliveryQueue {
    commands: mpsc::Sender<Command>,
    metrics: Arc<DeliveryMetrics>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryQueue {
    /// Reload pending events from `store` and start draining them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        store: Arc<dyn LocalStore>,
        transport: Arc<dyn HttpTransport>,
        endpoints: Endpoints,
        config: &DeliveryConfig,
    ) -> Self {
        let metrics = Arc::new(DeliveryMetrics::new());
        let events = load_pending(store.as_ref());
        if !events.is_empty() {
            info!(pending = events.len(), "resuming delivery of persisted events");
        }

        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let worker = Worker {
            store,
            transport,
            endpoints,
            policy: RetryPolicy::new(config),
            metrics: Arc::clone(&metrics),
            events,
            failures: 0,
            next_attempt: Instant::now(),
            unsaved: false,
        };
        let handle = tokio::spawn(worker.run(receiver));

        Self {
            commands,
            metrics,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Append `event` to the queue. Returns once it is persisted.
    pub async fn enqueue(&self, event: AnalyticsEvent) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Enqueue {
            event: Box::new(event),
            ack,
        })
        .await?;
        done.await.map_err(|_| OnboardError::QueueClosed)?
    }

    /// Snapshot of the events not yet delivered, head first.
    pub async fn pending(&self) -> Result<Vec<AnalyticsEvent>> {
        let (reply, events) = oneshot::channel();
        self.send(Command::Pending { reply }).await?;
        events.await.map_err(|_| OnboardError::QueueClosed)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.pending().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Attempt the head event now instead of waiting out the current delay.
    pub async fn drain_now(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::DrainNow { ack }).await?;
        done.await.map_err(|_| OnboardError::QueueClosed)
    }

    /// Stop the worker. Undelivered events stay persisted and are picked up
    /// by the next queue spawned over the same store.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { ack }).await.is_ok() {
            let _ = done.await;
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "delivery worker ended abnormally");
            }
        }
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| OnboardError::QueueClosed)
    }
}

/// Records are decoded one at a time so a single unreadable entry costs only
/// itself. It is dropped from the store on the next write.
fn load_pending(store: &dyn LocalStore) -> VecDeque<AnalyticsEvent> {
    let records = match store.get_json::<Vec<serde_json::Value>>(storage_keys::PENDING_EVENTS) {
        Ok(records) => records.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "persisted event queue unreadable, starting empty");
            return VecDeque::new();
        }
    };

    records
        .into_iter()
        .enumerate()
        .filter_map(|(position, record)| {
            serde_json::from_value::<AnalyticsEvent>(record)
                .map_err(|e| warn!(position, error = %e, "skipping unreadable persisted event"))
                .ok()
        })
        .collect()
}

type Attempt = BoxFuture<'static, std::result::Result<HttpResponse, TransportError>>;

struct Worker {
    store: Arc<dyn LocalStore>,
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    policy: RetryPolicy,
    metrics: Arc<DeliveryMetrics>,
    events: VecDeque<AnalyticsEvent>,
    /// Consecutive failed attempts of the current head.
    failures: u32,
    next_attempt: Instant,
    /// The last write of the list failed; the store may still hold events
    /// that were already settled.
    unsaved: bool,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut in_flight: Option<Attempt> = None;

        loop {
            let ready = in_flight.is_none() && !self.events.is_empty();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { ack }) => {
                        self.retry_unsaved();
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    self.settle(result);
                }
                _ = tokio::time::sleep_until(self.next_attempt), if ready => {
                    in_flight = self.attempt();
                }
            }
        }

        if !self.events.is_empty() {
            debug!(pending = self.events.len(), "delivery worker stopped with events pending");
        }
        self.metrics.flush();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue { event, ack } => {
                let result = self.push(*event);
                let _ = ack.send(result);
            }
            Command::Pending { reply } => {
                let _ = reply.send(self.events.iter().cloned().collect());
            }
            Command::DrainNow { ack } => {
                self.next_attempt = Instant::now();
                let _ = ack.send(());
            }
            Command::Shutdown { ack } => {
                let _ = ack.send(());
            }
        }
    }

    fn push(&mut self, event: AnalyticsEvent) -> Result<()> {
        self.events.push_back(event);
        if let Err(e) = self.persist() {
            self.events.pop_back();
            return Err(e);
        }
        self.metrics.inc_enqueued();
        Ok(())
    }

    /// Start delivering the head event.
    fn attempt(&mut self) -> Option<Attempt> {
        let head = self.events.front()?;
        match self.endpoints.event(head) {
            Ok(request) => {
                let transport = Arc::clone(&self.transport);
                Some(Box::pin(async move { transport.send(request).await }))
            }
            Err(e) => {
                let reason = DropReason::InvalidRequest(e.to_string());
                self.remove_head(|event_type| obs::emit_event_dropped(event_type, &reason));
                self.metrics.inc_dropped();
                None
            }
        }
    }

    fn settle(&mut self, result: std::result::Result<HttpResponse, TransportError>) {
        self.retry_unsaved();
        match classify(&result) {
            DeliveryOutcome::Delivered => {
                let attempts = self.failures + 1;
                self.remove_head(|event_type| obs::emit_event_delivered(event_type, attempts));
                self.metrics.inc_delivered();
            }
            DeliveryOutcome::Drop(reason) => {
                self.remove_head(|event_type| obs::emit_event_dropped(event_type, &reason));
                self.metrics.inc_dropped();
            }
            DeliveryOutcome::Retry(reason) => {
                self.failures = self.failures.saturating_add(1);
                let delay = self.policy.delay_for(&reason, self.failures);
                if let Some(head) = self.events.front() {
                    obs::emit_delivery_retry(
                        head.event_type.as_str(),
                        &reason,
                        delay.as_millis() as u64,
                    );
                }
                self.metrics.inc_retried();
                self.next_attempt = Instant::now() + delay;
            }
        }
    }

    /// Drop the head after a terminal outcome.
    ///
    /// If the write fails the event is gone from memory but still in the
    /// store. The write is retried on the next outcome and at shutdown; a
    /// crash before then redelivers the event under the same `eventId`.
    fn remove_head(&mut self, report: impl FnOnce(&str)) {
        if let Some(event) = self.events.pop_front() {
            report(event.event_type.as_str());
        }
        self.failures = 0;
        self.next_attempt = Instant::now() + self.policy.drain_interval();
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist event queue after removal");
        }
    }

    fn retry_unsaved(&mut self) {
        if !self.unsaved {
            return;
        }
        match self.persist() {
            Ok(()) => debug!(pending = self.events.len(), "event queue persisted after earlier failure"),
            Err(e) => warn!(error = %e, "event queue still not persisted"),
        }
    }

    fn persist(&mut self) -> Result<()> {
        let events: Vec<&AnalyticsEvent> = self.events.iter().collect();
        let written = self.store.set_json(storage_keys::PENDING_EVENTS, &events);
        self.unsaved = written.is_err();
        written?;
        Ok(())
    }
}
