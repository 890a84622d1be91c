use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bus::{EventBus, EventHandler};
use crate::envelope::EventEnvelope;
use crate::error::{BusError, Result};

#[derive(Default)]
struct BusState {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    published: Vec<EventEnvelope>,
    /// Remaining publish calls that should fail, simulating an unreachable
    /// transport.
    failures_left: u32,
    handler_failures: u64,
}

/// In-memory event bus.
///
/// Dispatches each published envelope to every handler registered for its
/// event type, sequentially and in registration order. Handler errors are
/// logged and counted but never propagated to the publisher: by contract
/// the publisher has already committed its state change, and correctness
/// rests on handler idempotency under redelivery, not on publish rollback.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<BusState>>,
}

impl InMemoryEventBus {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` publish calls fail, as an unreachable
    /// transport would. Used to exercise relay retry behavior.
    pub async fn fail_publishes(&self, count: u32) {
        self.state.write().await.failures_left = count;
    }

    /// Returns every envelope published so far, in publish order.
    pub async fn published(&self) -> Vec<EventEnvelope> {
        self.state.read().await.published.clone()
    }

    /// Returns the published envelopes of one event type.
    pub async fn published_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.state
            .read()
            .await
            .published
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns the number of handler invocations that returned an error.
    pub async fn handler_failures(&self) -> u64 {
        self.state.read().await.handler_failures
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        let handlers = {
            let mut state = self.state.write().await;
            if state.failures_left > 0 {
                state.failures_left -= 1;
                metrics::counter!("bus_publish_failures_total").increment(1);
                return Err(BusError::Publish("transport unreachable".to_string()));
            }
            state.published.push(envelope.clone());
            state
                .handlers
                .get(&envelope.event_type)
                .cloned()
                .unwrap_or_default()
        };

        metrics::counter!("bus_published_total").increment(1);
        tracing::debug!(
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            subscribers = handlers.len(),
            "publishing envelope"
        );

        for handler in handlers {
            if let Err(e) = handler.handle(&envelope).await {
                self.state.write().await.handler_failures += 1;
                metrics::counter!("bus_handler_failures_total").increment(1);
                tracing::error!(
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    error = %e,
                    "event handler failed"
                );
            }
        }

        Ok(())
    }

    async fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.state
            .write()
            .await
            .handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::InventoryReserved;
    use common::OrderNo;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        calls: AtomicU32,
        fail: bool,
    }

    impl Counting {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl EventHandler for Counting {
        async fn handle(&self, _envelope: &EventEnvelope) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BusError::Handler("boom".to_string()));
            }
            Ok(())
        }
    }

    fn envelope() -> EventEnvelope {
        EventEnvelope::wrap(&InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: true,
            reason: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn dispatches_to_matching_subscribers_only() {
        let bus = InMemoryEventBus::new();
        let matching = Counting::new(false);
        let other = Counting::new(false);

        bus.subscribe("InventoryReserved", matching.clone()).await;
        bus.subscribe("OrderPlaced", other.clone()).await;

        bus.publish(envelope()).await.unwrap();

        assert_eq!(matching.calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_error_does_not_fail_publish() {
        let bus = InMemoryEventBus::new();
        let failing = Counting::new(true);
        let healthy = Counting::new(false);

        bus.subscribe("InventoryReserved", failing.clone()).await;
        bus.subscribe("InventoryReserved", healthy.clone()).await;

        bus.publish(envelope()).await.unwrap();

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_failures().await, 1);
    }

    #[tokio::test]
    async fn fail_publishes_simulates_transport_outage() {
        let bus = InMemoryEventBus::new();
        bus.fail_publishes(2).await;

        assert!(bus.publish(envelope()).await.is_err());
        assert!(bus.publish(envelope()).await.is_err());
        assert!(bus.publish(envelope()).await.is_ok());
        assert_eq!(bus.published().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope()).await.unwrap();
        assert_eq!(bus.published_of_type("InventoryReserved").await.len(), 1);
    }
}
