mod common;

use common::harness;
use paycycle::application::consumer::ConsumerPool;
use paycycle::domain::events::EventKind;
use paycycle::domain::ports::{Disposition, MessageSource};
use paycycle::infrastructure::bus::InMemoryBus;
use serde_json::json;
use std::sync::Arc;

const REGISTERED: &str = "registered";
const DELETED: &str = "deleted";
const ROLE_CHANGED: &str = "role-changed";

fn publish(bus: &InMemoryBus, queue: &str, payload: serde_json::Value) {
    bus.publish(queue, serde_json::to_vec(&payload).unwrap());
}

fn bindings(bus: &Arc<InMemoryBus>) -> Vec<(EventKind, Arc<dyn MessageSource>)> {
    [
        (EventKind::Registered, REGISTERED),
        (EventKind::Deleted, DELETED),
        (EventKind::RoleChanged, ROLE_CHANGED),
    ]
    .into_iter()
    .map(|(kind, queue)| {
        let source: Arc<dyn MessageSource> = Arc::new(bus.consumer(queue));
        (kind, source)
    })
    .collect()
}

#[tokio::test]
async fn test_duplicate_and_aliased_registrations_create_one_row() {
    let h = harness(2025, 3, 1).await;
    let bus = Arc::new(InMemoryBus::new(3));
    let pool = ConsumerPool::start(h.engine.ingestor(), bindings(&bus));

    publish(&bus, REGISTERED, json!({"id": "E1", "role": "CLEANER"}));
    publish(&bus, REGISTERED, json!({"employeeId": "E1", "role": "CLEANER"}));
    publish(&bus, REGISTERED, json!({"employee_id": "E1", "role": "CLEANER"}));
    publish(&bus, REGISTERED, json!({"id": "E1", "employeeId": "E1", "role": "CLEANER"}));
    bus.close();
    pool.join().await;

    let statuses = h.engine.statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].employee_id, "E1");
    assert!(!statuses[0].paid);
    assert!(statuses[0].last_payment.is_none());
}

#[tokio::test]
async fn test_malformed_messages_are_acked_and_skipped() {
    let h = harness(2025, 3, 1).await;
    let bus = Arc::new(InMemoryBus::new(3));
    let pool = ConsumerPool::start(h.engine.ingestor(), bindings(&bus));

    bus.publish(REGISTERED, b"{not json".to_vec());
    publish(&bus, REGISTERED, json!({"role": "CLEANER"}));
    publish(&bus, REGISTERED, json!({"id": "E1", "employeeId": "E2", "role": "CLEANER"}));
    publish(&bus, REGISTERED, json!({"id": "", "role": "CLEANER"}));
    publish(&bus, REGISTERED, json!({"id": "E3", "role": "CLEANER"}));
    bus.close();

    let stats = pool.join().await;
    let registered = stats
        .iter()
        .find(|(kind, _)| *kind == EventKind::Registered)
        .map(|(_, stats)| *stats)
        .unwrap();
    assert_eq!(registered.dropped, 4);
    assert_eq!(registered.applied, 1);
    assert!(bus.dead_letters(REGISTERED).is_empty());

    let statuses = h.engine.statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].employee_id, "E3");
}

#[tokio::test]
async fn test_out_of_order_events_are_tolerated() {
    let h = harness(2025, 3, 1).await;
    let ingestor = h.engine.ingestor();
    let bus = Arc::new(InMemoryBus::new(3));

    // Deletion and role change for an employee nobody has registered yet.
    publish(&bus, DELETED, json!({"id": "E1"}));
    publish(&bus, ROLE_CHANGED, json!({"id": "E1", "role": "MANAGER"}));
    bus.close();
    ConsumerPool::start(ingestor.clone(), bindings(&bus)).join().await;
    assert!(h.engine.statuses().await.unwrap().is_empty());

    // The registration arrives late and still lands with its own role.
    let bus = Arc::new(InMemoryBus::new(3));
    publish(&bus, REGISTERED, json!({"id": "E1", "role": "CLEANER"}));
    bus.close();
    ConsumerPool::start(ingestor.clone(), bindings(&bus)).join().await;

    let statuses = h.engine.statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].position_name.as_deref(), Some("CLEANER"));
}

#[tokio::test]
async fn test_redelivery_after_lost_ack_is_idempotent() {
    let h = harness(2025, 3, 1).await;
    let bus = Arc::new(InMemoryBus::new(3));
    let ingestor = h.engine.ingestor();
    publish(&bus, REGISTERED, json!({"id": "E1", "role": "RECEPTIONIST"}));

    // A worker applies the event but dies before acknowledging it.
    let consumer = bus.consumer(REGISTERED);
    let delivery = consumer.receive().await.unwrap();
    let event = paycycle::domain::events::EmployeeEvent::decode(EventKind::Registered, &delivery.body)
        .unwrap();
    ingestor.apply(event).await.unwrap();
    assert_eq!(bus.recover(REGISTERED), 1);

    bus.close();
    let stats = ConsumerPool::start(ingestor, bindings(&bus)).join().await;
    let registered = stats
        .iter()
        .find(|(kind, _)| *kind == EventKind::Registered)
        .map(|(_, stats)| *stats)
        .unwrap();
    assert_eq!(registered.applied, 1);
    assert_eq!(h.engine.statuses().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_removes_row_and_repeats_are_harmless() {
    let h = harness(2025, 3, 1).await;
    common::register(&h.engine, "E1", "CLEANER").await;
    common::register(&h.engine, "E2", "CLEANER").await;

    let bus = Arc::new(InMemoryBus::new(3));
    publish(&bus, DELETED, json!({"employeeId": "E1"}));
    publish(&bus, DELETED, json!({"id": "E1"}));
    bus.close();
    ConsumerPool::start(h.engine.ingestor(), bindings(&bus)).join().await;

    let ids: Vec<String> = h
        .engine
        .statuses()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.employee_id)
        .collect();
    assert_eq!(ids, vec!["E2"]);
}

#[tokio::test]
async fn test_settled_deliveries_never_come_back() {
    let bus = Arc::new(InMemoryBus::new(3));
    let consumer = bus.consumer(REGISTERED);
    publish(&bus, REGISTERED, json!({"id": "E1", "role": "CLEANER"}));

    let delivery = consumer.receive().await.unwrap();
    consumer.settle(delivery, Disposition::Ack).await.unwrap();
    assert_eq!(bus.recover(REGISTERED), 0);
    assert!(bus.pending(REGISTERED).is_empty());
}
