use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{BusError, EventEnvelope, EventHandler, OrderPlaced};

use crate::model::PaymentMethod;
use crate::processor::{CreatePayment, PaymentProcessor};

/// Bus handler that creates a payment attempt when an order is placed.
///
/// The event's idempotency key carries through to the payment, so a
/// redelivered `OrderPlaced` finds the existing payment and changes
/// nothing. Events arriving over the bus carry no payment method; the
/// handler uses the method it was configured with.
pub struct OrderPlacedHandler {
    processor: Arc<PaymentProcessor>,
    method: PaymentMethod,
}

impl OrderPlacedHandler {
    /// Creates a handler that charges via the given method.
    pub fn new(processor: Arc<PaymentProcessor>, method: PaymentMethod) -> Self {
        Self { processor, method }
    }
}

#[async_trait]
impl EventHandler for OrderPlacedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> event_bus::Result<()> {
        let order: OrderPlaced = envelope.decode()?;

        self.processor
            .create(CreatePayment {
                order_no: order.order_no,
                amount: order.total,
                method: self.method,
                idempotency_key: order.idempotency_key,
            })
            .await
            .map_err(|e| BusError::Handler(e.to_string()))?;

        Ok(())
    }
}
