use std::pin::Pin;

use async_trait::async_trait;
use event_bus::EventId;
use futures_core::Stream;

use crate::record::OutboxRecord;
use crate::{OutboxError, Result};

/// A stream of outbox records.
pub type RecordStream = Pin<Box<dyn Stream<Item = std::result::Result<OutboxRecord, OutboxError>> + Send>>;

/// Relay-facing contract of a per-service outbox.
///
/// Writing records is backend-specific (the write must join the service's
/// own local transaction); draining and acknowledging them is uniform and
/// is all the relay needs.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` unpublished records, oldest first.
    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxRecord>>;

    /// Marks a record as published.
    ///
    /// Runs in its own transaction, separate from the publish itself. A
    /// crash between publish and mark leaves the record pending and causes
    /// re-delivery; downstream idempotency absorbs the duplicate.
    async fn mark_published(&self, id: EventId) -> Result<()>;

    /// Returns the number of unpublished records.
    async fn pending_count(&self) -> Result<usize>;

    /// Streams every record, published or not, in insertion order.
    async fn stream_records(&self) -> Result<RecordStream>;
}
