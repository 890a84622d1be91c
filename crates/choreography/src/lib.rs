//! Order fulfillment choreography.
//!
//! There is no central orchestrator: checkout commits an order and its
//! `OrderPlaced` outbox record in one transaction, the relay publishes it,
//! and the inventory and payment services react independently. Their
//! outcome events (`InventoryReserved`, `PaymentCompleted`) feed the
//! reaction handlers in this crate, which advance the order on success and
//! run the opposite side's compensation on failure.
//!
//! Every handler effect is a no-op on redelivery; the saga converges to
//! the same end state however the at-least-once bus interleaves or
//! duplicates deliveries.

pub mod checkout;
pub mod error;
pub mod fulfillment;
pub mod handlers;
pub mod notify;
pub mod order;
pub mod repository;

pub use checkout::{CheckoutService, PlaceOrder};
pub use error::{ChoreographyError, Result};
pub use fulfillment::{Fulfillment, RelayHandles};
pub use handlers::{InventoryReservedHandler, PaymentCompletedHandler};
pub use notify::{NotificationSender, NotifyError, RecordingNotificationSender};
pub use order::{Order, OrderStatus};
pub use repository::{InMemoryOrderRepository, OrderBook, OrderRepository, OrderUow, StatusChange};
