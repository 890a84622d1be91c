//! Inventory reservation manager.
//!
//! Consumes `OrderPlaced` events and reserves, confirms or cancels stock
//! idempotently per order number. The reservation state machine per order:
//!
//! ```text
//! NoReservation ──► Reserved ──┬──► Confirmed
//!                              └──► Released
//! ```
//!
//! Reservation is keyed by the order number, a natural unique key: a
//! duplicate `TryReserve` for an existing reservation is a no-op success,
//! never a double-reserve. Insufficient stock is a normal business outcome
//! carried in the emitted `InventoryReserved` event, not an error.

pub mod error;
pub mod handler;
pub mod item;
pub mod manager;
pub mod reservation;
pub mod store;

pub use error::{InventoryError, Result};
pub use handler::OrderPlacedHandler;
pub use item::InventoryItem;
pub use manager::{CancelOutcome, ConfirmOutcome, ReservationManager, ReserveOutcome};
pub use reservation::{Reservation, ReservationLine};
pub use store::{InventoryState, InventoryUow};
