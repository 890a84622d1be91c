//! Transactional outbox store and relay.
//!
//! Any state mutation that must be externally observable is written
//! together with an [`OutboxRecord`] in one atomic local transaction. This
//! is the core correctness device of the choreography: it prevents both
//! "state changed but event lost" and "event sent but state change rolled
//! back". The [`OutboxRelay`] then drains pending records and publishes
//! them to the bus, at-least-once, with exponential backoff on transport
//! failure.
//!
//! Two backends are provided: [`InMemoryUnitOfWork`] (single-lock
//! transactions over arbitrary service state, used throughout the tests)
//! and [`PostgresOutbox`] (sqlx, callers attach the insert to their own
//! database transaction).

pub mod dead_letter;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod relay;
pub mod store;

pub use dead_letter::{DeadLetter, DeadLetterStore, InMemoryDeadLetterStore};
pub use error::{OutboxError, Result};
pub use memory::{InMemoryUnitOfWork, OutboxBatch};
pub use postgres::{PostgresDeadLetterStore, PostgresOutbox};
pub use record::OutboxRecord;
pub use relay::{DrainStats, OutboxRelay, RelayConfig};
pub use store::{OutboxStore, RecordStream};
