use common::{AuditInfo, Sku};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

/// Stock levels for one SKU.
///
/// Invariant: `0 <= quantity_reserved <= quantity_on_hand` at all times.
/// Reservation increases `quantity_reserved`; confirmation decreases
/// `quantity_on_hand` and `quantity_reserved` together; cancellation
/// decreases `quantity_reserved` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub sku: Sku,
    pub quantity_on_hand: u32,
    pub quantity_reserved: u32,
    pub audit: AuditInfo,
}

impl InventoryItem {
    /// Creates an item with the given stock on hand and nothing reserved.
    pub fn new(sku: impl Into<Sku>, quantity_on_hand: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity_on_hand,
            quantity_reserved: 0,
            audit: AuditInfo::new(),
        }
    }

    /// Returns the quantity available for new reservations.
    pub fn available(&self) -> u32 {
        self.quantity_on_hand - self.quantity_reserved
    }

    /// Moves `quantity` units from available to reserved.
    pub fn reserve(&mut self, quantity: u32) -> Result<()> {
        if quantity > self.available() {
            return Err(InventoryError::InvariantViolation {
                sku: self.sku.clone(),
                detail: format!(
                    "cannot reserve {quantity} with only {} available",
                    self.available()
                ),
            });
        }
        self.quantity_reserved += quantity;
        self.audit.touch();
        Ok(())
    }

    /// Removes `quantity` reserved units from stock entirely.
    pub fn confirm(&mut self, quantity: u32) -> Result<()> {
        if quantity > self.quantity_reserved {
            return Err(InventoryError::InvariantViolation {
                sku: self.sku.clone(),
                detail: format!(
                    "cannot confirm {quantity} with only {} reserved",
                    self.quantity_reserved
                ),
            });
        }
        self.quantity_on_hand -= quantity;
        self.quantity_reserved -= quantity;
        self.audit.touch();
        Ok(())
    }

    /// Returns `quantity` reserved units to available stock.
    pub fn release(&mut self, quantity: u32) -> Result<()> {
        if quantity > self.quantity_reserved {
            return Err(InventoryError::InvariantViolation {
                sku: self.sku.clone(),
                detail: format!(
                    "cannot release {quantity} with only {} reserved",
                    self.quantity_reserved
                ),
            });
        }
        self.quantity_reserved -= quantity;
        self.audit.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_confirm_release_move_stock_correctly() {
        let mut item = InventoryItem::new("A", 10);
        assert_eq!(item.available(), 10);

        item.reserve(4).unwrap();
        assert_eq!(item.available(), 6);
        assert_eq!(item.quantity_reserved, 4);
        assert_eq!(item.quantity_on_hand, 10);

        item.confirm(3).unwrap();
        assert_eq!(item.quantity_on_hand, 7);
        assert_eq!(item.quantity_reserved, 1);

        item.release(1).unwrap();
        assert_eq!(item.quantity_reserved, 0);
        assert_eq!(item.quantity_on_hand, 7);
    }

    #[test]
    fn reserve_beyond_available_is_rejected() {
        let mut item = InventoryItem::new("A", 5);
        item.reserve(5).unwrap();

        let result = item.reserve(1);
        assert!(matches!(
            result,
            Err(InventoryError::InvariantViolation { .. })
        ));
        assert_eq!(item.quantity_reserved, 5);
    }

    #[test]
    fn confirm_more_than_reserved_is_rejected() {
        let mut item = InventoryItem::new("A", 5);
        item.reserve(2).unwrap();
        assert!(item.confirm(3).is_err());
    }

    #[test]
    fn release_more_than_reserved_is_rejected() {
        let mut item = InventoryItem::new("A", 5);
        assert!(item.release(1).is_err());
    }
}
