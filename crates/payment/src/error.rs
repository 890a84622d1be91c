use common::OrderNo;
use thiserror::Error;

use crate::model::PaymentMethod;
use crate::provider::ProviderError;

/// Errors that can occur during payment operations.
///
/// Business declines (invalid amount, provider rejection) are NOT here:
/// they produce a `Failed` payment and a negative `PaymentCompleted`
/// event rather than an error.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No provider is registered for the requested method.
    #[error("No provider registered for method '{0}'")]
    UnknownMethod(PaymentMethod),

    /// The provider reported an infrastructure failure.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A callback referenced a payment that does not exist.
    #[error("No payment found for provider reference '{0}'")]
    UnknownReference(String),

    /// No payment exists for the order.
    #[error("No payment found for order {0}")]
    NoPayment(OrderNo),

    /// A serialization error occurred while staging an outbox event.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An outbox error occurred.
    #[error("Outbox error: {0}")]
    Outbox(#[from] outbox::OutboxError),
}

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;
