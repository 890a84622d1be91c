//! Order aggregate and its state machine.

use common::{AuditInfo, CustomerId, Money, OrderNo};
use event_bus::OrderLine;
use serde::{Deserialize, Serialize};

/// The state of an order in its fulfillment lifecycle.
///
/// State transitions:
/// ```text
/// Placed ──┬──► Reserved ──► Paid
///          │        │          │
///          └────────┴──────────┴──► Cancelled
/// ```
///
/// `Paid` is reachable straight from `Placed` because the bus gives no
/// ordering between `InventoryReserved` and `PaymentCompleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Accepted at checkout, saga in flight.
    #[default]
    Placed,

    /// Inventory is held for the order.
    Reserved,

    /// Payment confirmed.
    Paid,

    /// The saga failed and the order was compensated (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order may move to `next` from this state.
    ///
    /// Repeated or out-of-order deliveries produce transitions that are
    /// simply not valid here; callers treat those as no-ops.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match next {
            OrderStatus::Placed => false,
            OrderStatus::Reserved => matches!(self, OrderStatus::Placed),
            OrderStatus::Paid => matches!(self, OrderStatus::Placed | OrderStatus::Reserved),
            OrderStatus::Cancelled => !matches!(self, OrderStatus::Cancelled),
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Reserved => "Reserved",
            OrderStatus::Paid => "Paid",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order as the choreography sees it.
///
/// Items are value records owned by the order; they carry no reference
/// back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_no: OrderNo,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<OrderLine>,
    pub total: Money,
    pub status: OrderStatus,
    pub audit: AuditInfo,
}

impl Order {
    /// Creates a freshly placed order.
    pub fn new(
        order_no: OrderNo,
        customer_id: Option<CustomerId>,
        items: Vec<OrderLine>,
        total: Money,
    ) -> Self {
        Self {
            order_no,
            customer_id,
            items,
            total,
            status: OrderStatus::Placed,
            audit: AuditInfo::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_placed() {
        assert_eq!(OrderStatus::default(), OrderStatus::Placed);
    }

    #[test]
    fn forward_transitions() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Reserved));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Reserved.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn cancellation_from_any_live_state() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Reserved.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Reserved));
        assert!(!OrderStatus::Reserved.can_transition_to(OrderStatus::Placed));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn only_cancelled_is_terminal() {
        assert!(!OrderStatus::Placed.is_terminal());
        assert!(!OrderStatus::Reserved.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }
}
