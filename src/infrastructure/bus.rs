use crate::domain::ports::{Delivery, Disposition, MessageSink, MessageSource};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{info, warn};

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Delivery>,
    in_flight: HashMap<u64, Delivery>,
    dead_letters: Vec<Delivery>,
    closed: bool,
}

#[derive(Default)]
struct Queue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Queue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A poisoned queue still holds consistent data: every mutation is a
        // single push/pop/insert.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An at-least-once, per-message-acknowledged queue broker kept in memory.
///
/// Deliveries stay in flight until settled; `Requeue` hands them back with a
/// bumped redelivery counter until `max_redeliveries` is exceeded, after which
/// they are dead-lettered. [`InMemoryBus::recover`] requeues everything still
/// in flight, which is what a broker does when a consumer dies before acking.
pub struct InMemoryBus {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    next_tag: AtomicU64,
    max_redeliveries: u32,
    closed: AtomicBool,
}

impl InMemoryBus {
    pub fn new(max_redeliveries: u32) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            next_tag: AtomicU64::new(1),
            max_redeliveries,
            closed: AtomicBool::new(false),
        }
    }

    fn declare(&self, name: &str) -> Arc<Queue> {
        let mut queues = self
            .queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queues
            .entry(name.to_string())
            .or_insert_with(|| {
                let queue = Queue::default();
                queue.lock().closed = self.closed.load(Ordering::SeqCst);
                Arc::new(queue)
            })
            .clone()
    }

    /// A consumer handle for the named queue, declaring it if needed.
    pub fn consumer(self: &Arc<Self>, name: &str) -> BusConsumer {
        BusConsumer {
            bus: Arc::clone(self),
            queue: self.declare(name),
        }
    }

    pub fn publish(&self, queue: &str, body: Vec<u8>) {
        let target = self.declare(queue);
        let delivery = Delivery {
            tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
            queue: queue.to_string(),
            body,
            redelivered: 0,
        };
        target.lock().ready.push_back(delivery);
        target.notify.notify_waiters();
    }

    /// Marks every queue, including ones declared later, closed: consumers
    /// get `None` once their queue is drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let queues = self
            .queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for queue in queues.values() {
            queue.lock().closed = true;
            queue.notify.notify_waiters();
        }
    }

    /// Puts every unsettled delivery of `queue` back at the front.
    pub fn recover(&self, queue: &str) -> usize {
        let target = self.declare(queue);
        let recovered = {
            let mut state = target.lock();
            let mut pending: Vec<Delivery> = state.in_flight.drain().map(|(_, d)| d).collect();
            pending.sort_by_key(|d| std::cmp::Reverse(d.tag));
            let count = pending.len();
            for mut delivery in pending {
                delivery.redelivered += 1;
                state.ready.push_front(delivery);
            }
            count
        };
        target.notify.notify_waiters();
        recovered
    }

    /// Messages waiting in `queue`, oldest first.
    pub fn pending(&self, queue: &str) -> Vec<Delivery> {
        self.declare(queue).lock().ready.iter().cloned().collect()
    }

    pub fn dead_letters(&self, queue: &str) -> Vec<Delivery> {
        self.declare(queue).lock().dead_letters.clone()
    }

    fn settle_in(&self, queue: &Queue, delivery: Delivery, disposition: Disposition) {
        {
            let mut state = queue.lock();
            state.in_flight.remove(&delivery.tag);
            match disposition {
                Disposition::Ack => {}
                Disposition::Requeue if delivery.redelivered < self.max_redeliveries => {
                    let mut delivery = delivery;
                    delivery.redelivered += 1;
                    state.ready.push_back(delivery);
                }
                Disposition::Requeue | Disposition::Reject => {
                    warn!(
                        queue = %delivery.queue,
                        tag = delivery.tag,
                        redelivered = delivery.redelivered,
                        "Message dead-lettered"
                    );
                    state.dead_letters.push(delivery);
                }
            }
        }
        queue.notify.notify_waiters();
    }
}

#[async_trait]
impl MessageSink for InMemoryBus {
    async fn send(&self, queue: &str, body: &[u8]) -> Result<()> {
        self.publish(queue, body.to_vec());
        Ok(())
    }
}

/// Consumer side of one [`InMemoryBus`] queue.
#[derive(Clone)]
pub struct BusConsumer {
    bus: Arc<InMemoryBus>,
    queue: Arc<Queue>,
}

#[async_trait]
impl MessageSource for BusConsumer {
    async fn receive(&self) -> Option<Delivery> {
        loop {
            let notified = self.queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.queue.lock();
                if let Some(delivery) = state.ready.pop_front() {
                    state.in_flight.insert(delivery.tag, delivery.clone());
                    return Some(delivery);
                }
                // In-flight messages may still come back through a requeue.
                if state.closed && state.in_flight.is_empty() {
                    return None;
                }
            }
            notified.await;
        }
    }

    async fn settle(&self, delivery: Delivery, disposition: Disposition) -> Result<()> {
        self.bus.settle_in(&self.queue, delivery, disposition);
        Ok(())
    }
}

/// Outbound transport that only logs; used when no broker is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

#[async_trait]
impl MessageSink for LoggingSink {
    async fn send(&self, queue: &str, body: &[u8]) -> Result<()> {
        info!(queue, body = %String::from_utf8_lossy(body), "Outbound message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_bus_ack_removes_message() {
        let bus = Arc::new(InMemoryBus::new(3));
        let consumer = bus.consumer("q");
        bus.publish("q", b"one".to_vec());

        let delivery = consumer.receive().await.unwrap();
        assert_eq!(delivery.body, b"one");
        consumer.settle(delivery, Disposition::Ack).await.unwrap();

        bus.close();
        assert!(consumer.receive().await.is_none());
        assert!(bus.dead_letters("q").is_empty());
    }

    #[tokio::test]
    async fn test_bus_requeue_until_dead_letter() {
        let bus = Arc::new(InMemoryBus::new(2));
        let consumer = bus.consumer("q");
        bus.publish("q", b"poison".to_vec());
        bus.close();

        let mut attempts = 0;
        while let Some(delivery) = consumer.receive().await {
            assert_eq!(delivery.redelivered, attempts);
            attempts += 1;
            consumer.settle(delivery, Disposition::Requeue).await.unwrap();
        }
        assert_eq!(attempts, 3);
        assert_eq!(bus.dead_letters("q").len(), 1);
    }

    #[tokio::test]
    async fn test_bus_recover_redelivers_unsettled() {
        let bus = Arc::new(InMemoryBus::new(3));
        let consumer = bus.consumer("q");
        bus.publish("q", b"a".to_vec());
        bus.publish("q", b"b".to_vec());

        let first = consumer.receive().await.unwrap();
        let _second = consumer.receive().await.unwrap();
        assert_eq!(bus.recover("q"), 2);

        let pending = bus.pending("q");
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].tag, first.tag);
        assert!(pending.iter().all(|d| d.redelivered == 1));
    }

    #[tokio::test]
    async fn test_bus_receive_waits_for_publish() {
        let bus = Arc::new(InMemoryBus::new(3));
        let consumer = bus.consumer("q");

        let waiter = tokio::spawn(async move { consumer.receive().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish("q", b"late".to_vec());

        let delivery = waiter.await.unwrap().unwrap();
        assert_eq!(delivery.body, b"late");
    }
}
