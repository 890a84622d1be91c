use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{BusError, EventEnvelope, EventHandler, OrderPlaced};

use crate::manager::ReservationManager;
use crate::reservation::ReservationLine;

/// Bus handler that reserves stock when an order is placed.
///
/// Idempotent under redelivery: the reservation's natural key absorbs
/// duplicate `OrderPlaced` envelopes, so delivering the same event twice
/// leaves stock levels where one delivery put them.
pub struct OrderPlacedHandler {
    manager: Arc<ReservationManager>,
}

impl OrderPlacedHandler {
    /// Creates a handler over the reservation manager.
    pub fn new(manager: Arc<ReservationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventHandler for OrderPlacedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> event_bus::Result<()> {
        let order: OrderPlaced = envelope.decode()?;

        let lines: Vec<ReservationLine> = order
            .items
            .iter()
            .map(|item| ReservationLine::new(item.sku.clone(), item.quantity))
            .collect();

        self.manager
            .try_reserve(&order.order_no, &lines)
            .await
            .map_err(|e| BusError::Handler(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InventoryState;
    use common::{IdempotencyKey, Money, OrderNo, Sku};
    use event_bus::{EventBus, InMemoryEventBus, IntegrationEvent, OrderLine};
    use outbox::{InMemoryUnitOfWork, OutboxStore};

    fn order_placed(order_no: &str) -> OrderPlaced {
        OrderPlaced {
            order_no: OrderNo::new(order_no),
            customer_id: None,
            total: Money::from_cents(2000),
            items: vec![OrderLine::new("A", 2, Money::from_cents(1000))],
            idempotency_key: IdempotencyKey::new("K1"),
        }
    }

    async fn wired_manager() -> (InMemoryEventBus, Arc<ReservationManager>) {
        let manager = Arc::new(ReservationManager::new(InMemoryUnitOfWork::new(
            InventoryState::default(),
        )));
        manager.seed("A", 5).await;

        let bus = InMemoryEventBus::new();
        bus.subscribe(
            OrderPlaced::EVENT_TYPE,
            Arc::new(OrderPlacedHandler::new(Arc::clone(&manager))),
        )
        .await;
        (bus, manager)
    }

    #[tokio::test]
    async fn order_placed_reserves_stock() {
        let (bus, manager) = wired_manager().await;

        let envelope = EventEnvelope::wrap(&order_placed("ORD-100")).unwrap();
        bus.publish(envelope).await.unwrap();

        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_reserved, 2);
    }

    #[tokio::test]
    async fn duplicate_delivery_reserves_once() {
        let (bus, manager) = wired_manager().await;

        let envelope = EventEnvelope::wrap(&order_placed("ORD-100")).unwrap();
        bus.publish(envelope.clone()).await.unwrap();
        bus.publish(envelope).await.unwrap();

        let item = manager.item(&Sku::new("A")).await.unwrap();
        assert_eq!(item.quantity_reserved, 2);
        // Only one InventoryReserved was staged.
        assert_eq!(manager.uow().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_handler_error() {
        let (bus, _manager) = wired_manager().await;

        let envelope = EventEnvelope::from_parts(
            event_bus::EventId::new(),
            OrderPlaced::EVENT_TYPE,
            chrono::Utc::now(),
            serde_json::json!({"nonsense": true}),
        );
        bus.publish(envelope).await.unwrap();

        assert_eq!(bus.handler_failures().await, 1);
    }
}
