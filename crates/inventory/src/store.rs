//! Inventory service state held in a transactional unit of work.

use std::collections::HashMap;

use common::{OrderNo, Sku};
use outbox::InMemoryUnitOfWork;

use crate::item::InventoryItem;
use crate::reservation::Reservation;

/// The inventory service's tables: stock levels and active reservations.
#[derive(Debug, Clone, Default)]
pub struct InventoryState {
    pub items: HashMap<Sku, InventoryItem>,
    pub reservations: HashMap<OrderNo, Reservation>,
}

/// Unit of work over [`InventoryState`]; every mutation commits atomically
/// with the outbox records it stages.
pub type InventoryUow = InMemoryUnitOfWork<InventoryState>;
