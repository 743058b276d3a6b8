//! Consumer workers: one task per inbound event kind.
//!
//! A delivery is only settled after the store write it triggers has finished,
//! so aborting a worker mid-message leaves the delivery unacknowledged and the
//! bus redelivers it; handler idempotence makes that safe.

use super::ingestion::{EventIngestor, IngestOutcome};
use crate::domain::events::{EmployeeEvent, EventKind};
use crate::domain::ports::{Delivery, Disposition, MessageSource};
use crate::observability::consumer_span;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

/// How one delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handling {
    Applied(IngestOutcome),
    /// Failed decoding or validation; dropped for good.
    Malformed,
    /// Infrastructure failure; the bus should try again later.
    Transient,
    Failed,
}

impl Handling {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Applied(_) | Self::Malformed => Disposition::Ack,
            Self::Transient => Disposition::Requeue,
            Self::Failed => Disposition::Reject,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub applied: u64,
    pub dropped: u64,
    pub requeued: u64,
}

impl WorkerStats {
    fn record(&mut self, handling: Handling) {
        match handling {
            Handling::Applied(_) => self.applied += 1,
            Handling::Malformed | Handling::Failed => self.dropped += 1,
            Handling::Transient => self.requeued += 1,
        }
    }
}

/// Decodes and applies one delivery. Never fails: every outcome maps to a
/// disposition for the bus.
pub async fn handle_delivery(
    ingestor: &EventIngestor,
    kind: EventKind,
    delivery: &Delivery,
) -> Handling {
    let event = match EmployeeEvent::decode(kind, &delivery.body) {
        Ok(event) => event,
        Err(e) => {
            warn!(
                queue = %delivery.queue,
                tag = delivery.tag,
                error = %e,
                "Dropping malformed message"
            );
            return Handling::Malformed;
        }
    };

    let employee_id = event.employee_id().to_string();
    match ingestor.apply(event).await {
        Ok(outcome) => {
            debug!(subject = kind.subject(), employee_id = %employee_id, ?outcome, "Message applied");
            Handling::Applied(outcome)
        }
        Err(e) if e.is_transient() => {
            warn!(
                subject = kind.subject(),
                employee_id = %employee_id,
                redelivered = delivery.redelivered,
                error = %e,
                "Transient failure, handing message back for redelivery"
            );
            Handling::Transient
        }
        Err(e) => {
            error!(
                subject = kind.subject(),
                employee_id = %employee_id,
                error = %e,
                "Rejecting message"
            );
            Handling::Failed
        }
    }
}

pub struct ConsumerPool {
    workers: Vec<(EventKind, JoinHandle<WorkerStats>)>,
    shutdown: watch::Sender<bool>,
}

impl ConsumerPool {
    pub fn start(
        ingestor: Arc<EventIngestor>,
        bindings: Vec<(EventKind, Arc<dyn MessageSource>)>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let workers = bindings
            .into_iter()
            .map(|(kind, source)| {
                let worker = run_worker(Arc::clone(&ingestor), kind, source, shutdown.subscribe());
                let handle = tokio::spawn(worker.instrument(consumer_span(kind.subject())));
                (kind, handle)
            })
            .collect();
        info!("Event consumers started");
        Self { workers, shutdown }
    }

    /// Waits for every source to close and drain.
    pub async fn join(self) -> Vec<(EventKind, WorkerStats)> {
        let mut stats = Vec::with_capacity(self.workers.len());
        for (kind, handle) in self.workers {
            match handle.await {
                Ok(worker) => stats.push((kind, worker)),
                Err(e) => error!(subject = kind.subject(), error = %e, "Consumer task failed"),
            }
        }
        stats
    }

    /// Stops taking new deliveries and waits for the ones in progress.
    pub async fn shutdown(self) -> Vec<(EventKind, WorkerStats)> {
        let _ = self.shutdown.send(true);
        self.join().await
    }
}

async fn run_worker(
    ingestor: Arc<EventIngestor>,
    kind: EventKind,
    source: Arc<dyn MessageSource>,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        let delivery = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            delivery = source.receive() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        let handling = handle_delivery(&ingestor, kind, &delivery).await;
        stats.record(handling);
        if let Err(e) = source.settle(delivery, handling.disposition()).await {
            error!(subject = kind.subject(), error = %e, "Failed to settle delivery");
        }
    }
    debug!(subject = kind.subject(), ?stats, "Consumer stopped");
    stats
}
