use thiserror::Error;

/// Errors that can occur on the bus or inside a handler.
#[derive(Debug, Error)]
pub enum BusError {
    /// The transport refused or failed to accept the envelope.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// An envelope could not be decoded into the expected contract.
    #[error("Decode error for event type '{event_type}': {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// An envelope carried a different event type than the handler expected.
    #[error("Unexpected event type: expected '{expected}', got '{actual}'")]
    UnexpectedType {
        expected: &'static str,
        actual: String,
    },

    /// A serialization error occurred while wrapping an event.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A handler reported a failure it could not absorb.
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
