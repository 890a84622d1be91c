//! Typed event contracts and the publish/subscribe transport.
//!
//! This crate is the leaf dependency of the fulfillment choreography. It
//! defines the immutable [`EventEnvelope`] every message travels in, the
//! integration event contracts exchanged between services, and the
//! [`EventBus`] abstraction with an in-memory implementation.
//!
//! Delivery is at-least-once: an envelope may reach a handler more than
//! once under redelivery, and no ordering is guaranteed between distinct
//! event types. Handlers must be idempotent.

pub mod bus;
pub mod contracts;
pub mod envelope;
pub mod error;
pub mod memory;

pub use bus::{EventBus, EventHandler};
pub use contracts::{
    InventoryReserved, OrderLine, OrderPlaced, PaymentCompleted, PaymentOutcome,
};
pub use envelope::{EventEnvelope, EventId, IntegrationEvent};
pub use error::{BusError, Result};
pub use memory::InMemoryEventBus;
