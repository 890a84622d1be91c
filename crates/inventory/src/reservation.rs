use chrono::{DateTime, Utc};
use common::{OrderNo, Sku};
use serde::{Deserialize, Serialize};

/// One reserved line: a SKU and how many units are held for the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub sku: Sku,
    pub quantity: u32,
}

impl ReservationLine {
    /// Creates a reservation line.
    pub fn new(sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

/// Stock held for one order, keyed by the order number.
///
/// Created on the first successful reservation attempt; `confirmed` flips
/// on payment success; the record is removed on cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub order_no: OrderNo,
    pub lines: Vec<ReservationLine>,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates an unconfirmed reservation for an order.
    pub fn new(order_no: OrderNo, lines: Vec<ReservationLine>) -> Self {
        Self {
            order_no,
            lines,
            confirmed: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reservation_is_unconfirmed() {
        let reservation = Reservation::new(
            OrderNo::new("ORD-1"),
            vec![ReservationLine::new("A", 2)],
        );
        assert!(!reservation.confirmed);
        assert_eq!(reservation.lines.len(), 1);
    }
}
