//! Shared value types for the order fulfillment services.
//!
//! Every identifier that crosses a service boundary lives here so the
//! services agree on one canonical representation: business keys
//! ([`OrderNo`], [`Sku`], [`IdempotencyKey`]), money arithmetic
//! ([`Money`]), audit metadata ([`AuditInfo`]) and the per-key
//! serialization primitive ([`KeyedLock`]).

pub mod audit;
pub mod money;
pub mod sync;
pub mod types;

pub use audit::AuditInfo;
pub use money::Money;
pub use sync::KeyedLock;
pub use types::{CustomerId, IdempotencyKey, OrderNo, Sku};
