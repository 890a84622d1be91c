use common::Sku;
use thiserror::Error;

/// Errors that can occur during inventory operations.
///
/// Insufficient stock is deliberately NOT here: it is a business outcome
/// returned in [`ReserveOutcome`](crate::ReserveOutcome), not a failure.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The stock invariant `0 <= reserved <= on_hand` would be violated.
    #[error("Stock invariant violated for {sku}: {detail}")]
    InvariantViolation { sku: Sku, detail: String },

    /// A SKU referenced by a reservation does not exist.
    #[error("Unknown SKU: {0}")]
    UnknownSku(Sku),

    /// A serialization error occurred while staging an outbox event.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An outbox error occurred.
    #[error("Outbox error: {0}")]
    Outbox(#[from] outbox::OutboxError),
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
