//! Integration event contracts exchanged between services.
//!
//! These shapes are the cross-service wire contract. `OrderPlaced` always
//! carries the idempotency key; the payment service reuses it end-to-end so
//! redelivered orders can never charge twice.

use common::{CustomerId, IdempotencyKey, Money, OrderNo, Sku};
use serde::{Deserialize, Serialize};

use crate::envelope::IntegrationEvent;

/// One line of an order: what was bought, how many, at what price.
///
/// Lines are value records owned by their parent; they carry no reference
/// back to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: Sku,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Creates an order line.
    pub fn new(sku: impl Into<Sku>, quantity: u32, unit_price: Money) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the line total (unit price times quantity).
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Emitted once per checkout when an order has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_no: OrderNo,
    pub customer_id: Option<CustomerId>,
    pub total: Money,
    pub items: Vec<OrderLine>,
    pub idempotency_key: IdempotencyKey,
}

impl IntegrationEvent for OrderPlaced {
    const EVENT_TYPE: &'static str = "OrderPlaced";
}

/// Outcome of an inventory reservation attempt for an order.
///
/// `success = false` is a normal business outcome (e.g. insufficient
/// stock), not an infrastructure failure; it drives compensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReserved {
    pub order_no: OrderNo,
    pub success: bool,
    pub reason: Option<String>,
}

impl IntegrationEvent for InventoryReserved {
    const EVENT_TYPE: &'static str = "InventoryReserved";
}

/// Terminal outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl PaymentOutcome {
    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Succeeded => "Succeeded",
            PaymentOutcome::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Emitted when a payment reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub order_no: OrderNo,
    pub payment_id: String,
    pub status: PaymentOutcome,
    pub paid_amount: Money,
    pub reason: Option<String>,
}

impl IntegrationEvent for PaymentCompleted {
    const EVENT_TYPE: &'static str = "PaymentCompleted";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order_placed() -> OrderPlaced {
        OrderPlaced {
            order_no: OrderNo::new("ORD-100"),
            customer_id: Some(CustomerId::new(7)),
            total: Money::from_cents(2000),
            items: vec![OrderLine::new("A", 2, Money::from_cents(1000))],
            idempotency_key: IdempotencyKey::new("K1"),
        }
    }

    #[test]
    fn order_line_total() {
        let line = OrderLine::new("A", 3, Money::from_cents(250));
        assert_eq!(line.total(), Money::from_cents(750));
    }

    #[test]
    fn order_placed_wire_shape() {
        let event = sample_order_placed();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["order_no"], "ORD-100");
        assert_eq!(json["customer_id"], 7);
        assert_eq!(json["items"][0]["sku"], "A");
        assert_eq!(json["items"][0]["quantity"], 2);
        assert_eq!(json["idempotency_key"], "K1");
    }

    #[test]
    fn order_placed_without_customer() {
        let mut event = sample_order_placed();
        event.customer_id = None;

        let json = serde_json::to_string(&event).unwrap();
        let back: OrderPlaced = serde_json::from_str(&json).unwrap();
        assert!(back.customer_id.is_none());
    }

    #[test]
    fn payment_completed_roundtrip() {
        let event = PaymentCompleted {
            order_no: OrderNo::new("ORD-100"),
            payment_id: "PAY-1".to_string(),
            status: PaymentOutcome::Failed,
            paid_amount: Money::from_cents(2000),
            reason: Some("card declined".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: PaymentCompleted = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, PaymentOutcome::Failed);
        assert_eq!(back.reason.as_deref(), Some("card declined"));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(OrderPlaced::EVENT_TYPE, "OrderPlaced");
        assert_eq!(InventoryReserved::EVENT_TYPE, "InventoryReserved");
        assert_eq!(PaymentCompleted::EVENT_TYPE, "PaymentCompleted");
    }
}
