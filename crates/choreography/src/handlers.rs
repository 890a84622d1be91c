//! Reaction handlers: the choreographed saga's coordination logic.
//!
//! Compensation is triggered by failure events from either side: a failed
//! reservation cancels the order and reverses any payment; a failed
//! payment releases the reservation and cancels the order. A payment that
//! succeeds after the order was already cancelled is refunded instead of
//! confirmed.

use std::sync::Arc;

use async_trait::async_trait;
use event_bus::{
    BusError, EventEnvelope, EventHandler, InventoryReserved, PaymentCompleted, PaymentOutcome,
};
use inventory::ReservationManager;
use payment::PaymentProcessor;

use crate::notify::NotificationSender;
use crate::order::{Order, OrderStatus};
use crate::repository::OrderRepository;

fn contact(order: &Order) -> String {
    match order.customer_id {
        Some(id) => format!("customer-{id}@example.test"),
        None => "guest@example.test".to_string(),
    }
}

async fn notify_order_outcome(
    notifier: &Arc<dyn NotificationSender>,
    orders: &Arc<dyn OrderRepository>,
    order_no: &common::OrderNo,
    subject: &str,
    body: &str,
) {
    let Ok(Some(order)) = orders.get(order_no).await else {
        return;
    };
    // Fire and forget: the saga never depends on the notification result.
    if let Err(e) = notifier.send_email(&contact(&order), subject, body).await {
        tracing::debug!(%order_no, error = %e, "notification send failed");
    }
}

/// Reacts to reservation outcomes.
///
/// Success advances the order to `Reserved`. Failure is the saga's first
/// compensation trigger: the order is cancelled and, if a payment already
/// went through, it is refunded.
pub struct InventoryReservedHandler {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<PaymentProcessor>,
    notifier: Arc<dyn NotificationSender>,
}

impl InventoryReservedHandler {
    /// Creates the handler.
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<PaymentProcessor>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            orders,
            payments,
            notifier,
        }
    }
}

#[async_trait]
impl EventHandler for InventoryReservedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> event_bus::Result<()> {
        let event: InventoryReserved = envelope.decode()?;

        if event.success {
            self.orders
                .update_status(&event.order_no, OrderStatus::Reserved)
                .await
                .map_err(|e| BusError::Handler(e.to_string()))?;
            return Ok(());
        }

        let reason = event.reason.as_deref().unwrap_or("unknown");
        tracing::warn!(order_no = %event.order_no, %reason, "reservation failed, compensating");
        metrics::counter!("saga_compensations_total").increment(1);

        self.orders
            .update_status(&event.order_no, OrderStatus::Cancelled)
            .await
            .map_err(|e| BusError::Handler(e.to_string()))?;
        self.payments
            .refund(&event.order_no)
            .await
            .map_err(|e| BusError::Handler(e.to_string()))?;

        notify_order_outcome(
            &self.notifier,
            &self.orders,
            &event.order_no,
            "Order cancelled",
            &format!("Order {} was cancelled: {reason}", event.order_no),
        )
        .await;

        Ok(())
    }
}

/// Reacts to payment outcomes.
///
/// Success confirms the reservation and advances the order to `Paid`,
/// unless the order was already cancelled by the other side, in which case
/// the payment is refunded. Failure releases the reservation and cancels
/// the order.
pub struct PaymentCompletedHandler {
    orders: Arc<dyn OrderRepository>,
    inventory: Arc<ReservationManager>,
    payments: Arc<PaymentProcessor>,
    notifier: Arc<dyn NotificationSender>,
}

impl PaymentCompletedHandler {
    /// Creates the handler.
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        inventory: Arc<ReservationManager>,
        payments: Arc<PaymentProcessor>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            orders,
            inventory,
            payments,
            notifier,
        }
    }
}

#[async_trait]
impl EventHandler for PaymentCompletedHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> event_bus::Result<()> {
        let event: PaymentCompleted = envelope.decode()?;

        match event.status {
            PaymentOutcome::Succeeded => {
                let order = self
                    .orders
                    .get(&event.order_no)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;

                if order.map(|o| o.status) == Some(OrderStatus::Cancelled) {
                    // The other side already failed; reverse the charge
                    // instead of confirming stock for a dead order.
                    tracing::warn!(
                        order_no = %event.order_no,
                        "payment succeeded for a cancelled order, refunding"
                    );
                    metrics::counter!("saga_compensations_total").increment(1);
                    self.payments
                        .refund(&event.order_no)
                        .await
                        .map_err(|e| BusError::Handler(e.to_string()))?;
                    return Ok(());
                }

                self.inventory
                    .confirm(&event.order_no)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;
                self.orders
                    .update_status(&event.order_no, OrderStatus::Paid)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;

                notify_order_outcome(
                    &self.notifier,
                    &self.orders,
                    &event.order_no,
                    "Payment received",
                    &format!("Payment for order {} of {} received", event.order_no, event.paid_amount),
                )
                .await;
            }
            PaymentOutcome::Failed => {
                let reason = event.reason.as_deref().unwrap_or("unknown");
                tracing::warn!(order_no = %event.order_no, %reason, "payment failed, compensating");
                metrics::counter!("saga_compensations_total").increment(1);

                self.inventory
                    .cancel(&event.order_no)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;
                self.orders
                    .update_status(&event.order_no, OrderStatus::Cancelled)
                    .await
                    .map_err(|e| BusError::Handler(e.to_string()))?;

                notify_order_outcome(
                    &self.notifier,
                    &self.orders,
                    &event.order_no,
                    "Order cancelled",
                    &format!("Order {} was cancelled: payment failed ({reason})", event.order_no),
                )
                .await;
            }
        }

        Ok(())
    }
}
