#![allow(dead_code)]

use paycycle::application::engine::FinanceEngine;
use paycycle::application::publisher::{OutboundPublisher, PublishPolicy};
use paycycle::domain::clock::FixedClock;
use paycycle::domain::events::EmployeeEvent;
use paycycle::infrastructure::bus::InMemoryBus;
use paycycle::infrastructure::in_memory::InMemoryStore;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub struct Harness {
    pub engine: FinanceEngine,
    pub clock: Arc<FixedClock>,
    pub outbound: Arc<InMemoryBus>,
}

/// An engine over an in-memory store, frozen at midday UTC on the given date,
/// publishing into an in-memory bus, with the default positions seeded.
pub async fn harness(year: i32, month: u32, day: u32) -> Harness {
    let clock = Arc::new(FixedClock::on(year, month, day));
    let outbound = Arc::new(InMemoryBus::new(3));
    let publisher = Arc::new(OutboundPublisher::start(
        outbound.clone(),
        PublishPolicy::default(),
    ));
    let engine = FinanceEngine::new(Arc::new(InMemoryStore::new()), clock.clone(), publisher);
    engine.positions().seed_defaults().await.unwrap();
    Harness {
        engine,
        clock,
        outbound,
    }
}

pub async fn register(engine: &FinanceEngine, id: &str, role: &str) {
    engine
        .ingestor()
        .apply(EmployeeEvent::Registered {
            id: id.to_string(),
            role: role.to_string(),
        })
        .await
        .unwrap();
}

pub async fn paid_count(engine: &FinanceEngine) -> usize {
    engine
        .statuses()
        .await
        .unwrap()
        .iter()
        .filter(|s| s.paid)
        .count()
}

pub fn bodies(bus: &InMemoryBus, queue: &str) -> Vec<Value> {
    bus.pending(queue)
        .iter()
        .map(|d| serde_json::from_slice(&d.body).unwrap())
        .collect()
}

/// Writes `(queue, payload)` pairs as a JSON-lines event log.
pub fn write_event_log(path: &Path, events: &[(&str, Value)]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for (queue, payload) in events {
        let line = serde_json::json!({ "queue": queue, "payload": payload });
        writeln!(file, "{line}")?;
    }
    Ok(())
}
