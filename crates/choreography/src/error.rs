use common::OrderNo;
use thiserror::Error;

/// Errors that can occur in the choreography layer.
#[derive(Debug, Error)]
pub enum ChoreographyError {
    /// An inventory operation failed.
    #[error("Inventory error: {0}")]
    Inventory(#[from] inventory::InventoryError),

    /// A payment operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] payment::PaymentError),

    /// An outbox operation failed.
    #[error("Outbox error: {0}")]
    Outbox(#[from] outbox::OutboxError),

    /// A bus operation failed.
    #[error("Bus error: {0}")]
    Bus(#[from] event_bus::BusError),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderNo),
}

/// Result type for choreography operations.
pub type Result<T> = std::result::Result<T, ChoreographyError>;
