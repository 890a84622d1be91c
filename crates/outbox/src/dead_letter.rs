use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;
use crate::record::OutboxRecord;

/// A record the relay gave up on, parked for manual inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The offending outbox record, as stored.
    pub record: OutboxRecord,
    /// Why the relay could not process it.
    pub reason: String,
    /// When the record was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Creates a dead letter stamped with the current time.
    pub fn new(record: OutboxRecord, reason: impl Into<String>) -> Self {
        Self {
            record,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Sink for records with fatal, non-retryable defects.
///
/// Routing a poison record here (instead of retrying it) keeps the relay
/// making progress on the healthy rows behind it.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Parks a dead letter.
    async fn push(&self, letter: DeadLetter) -> Result<()>;

    /// Returns every parked letter.
    async fn all(&self) -> Result<Vec<DeadLetter>>;

    /// Returns the number of parked letters.
    async fn len(&self) -> Result<usize>;
}

/// In-memory dead-letter store.
#[derive(Clone, Default)]
pub struct InMemoryDeadLetterStore {
    letters: Arc<RwLock<Vec<DeadLetter>>>,
}

impl InMemoryDeadLetterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn push(&self, letter: DeadLetter) -> Result<()> {
        tracing::warn!(
            event_id = %letter.record.id,
            event_type = %letter.record.event_type,
            reason = %letter.reason,
            "record dead-lettered"
        );
        self.letters.write().await.push(letter);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<DeadLetter>> {
        Ok(self.letters.read().await.clone())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.letters.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderNo;
    use event_bus::InventoryReserved;

    #[tokio::test]
    async fn push_and_inspect() {
        let store = InMemoryDeadLetterStore::new();
        let record = OutboxRecord::for_event(&InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: true,
            reason: None,
        })
        .unwrap();

        store
            .push(DeadLetter::new(record, "corrupted payload"))
            .await
            .unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        let letters = store.all().await.unwrap();
        assert_eq!(letters[0].reason, "corrupted payload");
    }
}
