use thiserror::Error;

/// Errors that can occur when interacting with the outbox.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record to mark published does not exist.
    #[error("Outbox record not found: {0}")]
    RecordNotFound(event_bus::EventId),
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
