//! Best-effort outbound publication.
//!
//! State changes are committed first; the resulting events are then handed to
//! [`OutboundPublisher::publish`], which only enqueues onto a bounded channel
//! and returns. A dedicated task drains the channel into a [`MessageSink`],
//! retrying with exponential backoff and finally dropping what it cannot
//! deliver. A slow or absent broker therefore never blocks a state mutation.

use crate::domain::events::OutboundEvent;
use crate::domain::ports::MessageSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    /// Outbound queue capacity; events beyond it are dropped.
    pub capacity: usize,
    /// Send attempts per queue before giving up on an event.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each one after.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl PublishPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Queue deliveries that reached the sink.
    pub published: u64,
    /// Failed attempts that were retried.
    pub retried: u64,
    /// Events abandoned: queue full, closed, or retries exhausted.
    pub dropped: u64,
}

enum Command {
    Publish(OutboundEvent),
    Flush(oneshot::Sender<()>),
}

pub struct OutboundPublisher {
    tx: mpsc::Sender<Command>,
    counters: Arc<Counters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OutboundPublisher {
    /// Spawns the drain task; must be called inside a tokio runtime.
    pub fn start(sink: Arc<dyn MessageSink>, policy: PublishPolicy) -> Self {
        let (tx, rx) = mpsc::channel(policy.capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker = tokio::spawn(drain(rx, sink, policy, Arc::clone(&counters)));
        Self {
            tx,
            counters,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueues an event without waiting.
    pub fn publish(&self, event: OutboundEvent) {
        let subject = event.subject();
        match self.tx.try_send(Command::Publish(event)) {
            Ok(()) => debug!(subject, "Outbound event queued"),
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(subject, "Outbound queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(subject, "Publisher closed, event dropped");
            }
        }
    }

    /// Waits until every event queued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Drains what is queued, then stops the drain task.
    pub async fn close(&self) -> PublishStats {
        self.flush().await;
        if let Some(worker) = self.worker.lock().await.take() {
            worker.abort();
            let _ = worker.await;
        }
        self.stats()
    }

    pub fn stats(&self) -> PublishStats {
        PublishStats {
            published: self.counters.published.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn drain(
    mut rx: mpsc::Receiver<Command>,
    sink: Arc<dyn MessageSink>,
    policy: PublishPolicy,
    counters: Arc<Counters>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Publish(event) => deliver(&event, sink.as_ref(), &policy, &counters).await,
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn deliver(
    event: &OutboundEvent,
    sink: &dyn MessageSink,
    policy: &PublishPolicy,
    counters: &Counters,
) {
    let body = match event.to_body() {
        Ok(body) => body,
        Err(e) => {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            error!(subject = event.subject(), error = %e, "Failed to encode outbound event");
            return;
        }
    };

    for queue in event.queues() {
        let mut attempt = 1;
        loop {
            match sink.send(queue, &body).await {
                Ok(()) => {
                    counters.published.fetch_add(1, Ordering::Relaxed);
                    debug!(queue, subject = event.subject(), "Message published");
                    break;
                }
                Err(e) if attempt < policy.max_attempts => {
                    counters.retried.fetch_add(1, Ordering::Relaxed);
                    warn!(queue, attempt, error = %e, "Publish failed, retrying");
                    tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    error!(queue, attempt, error = %e, "Publish failed, giving up");
                    break;
                }
            }
        }
    }
}
