use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use event_bus::{EventId, IntegrationEvent};
use tokio::sync::RwLock;

use crate::record::OutboxRecord;
use crate::store::{OutboxStore, RecordStream};
use crate::{OutboxError, Result};

/// Events staged inside a transaction, committed with it or not at all.
#[derive(Default)]
pub struct OutboxBatch {
    records: Vec<OutboxRecord>,
}

impl OutboxBatch {
    /// Stages an integration event for the enclosing transaction.
    pub fn add_event<E: IntegrationEvent>(&mut self, event: &E) -> Result<()> {
        self.records.push(OutboxRecord::for_event(event)?);
        Ok(())
    }

    /// Stages a pre-built record.
    pub fn add_record(&mut self, record: OutboxRecord) {
        self.records.push(record);
    }

    /// Returns the number of staged records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct UowInner<S> {
    state: S,
    outbox: Vec<OutboxRecord>,
}

/// In-memory unit of work: service state and its outbox behind one lock.
///
/// [`transact`](Self::transact) runs a closure against a working copy of
/// the state together with an [`OutboxBatch`]. On `Ok` the mutated copy and
/// the staged records are committed under the single write lock; on `Err`
/// both are discarded. That all-or-nothing commit is the in-memory
/// equivalent of writing the state change and the outbox row in one
/// database transaction.
#[derive(Clone)]
pub struct InMemoryUnitOfWork<S> {
    inner: Arc<RwLock<UowInner<S>>>,
}

impl<S> InMemoryUnitOfWork<S>
where
    S: Clone + Send + Sync,
{
    /// Creates a unit of work around an initial state.
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(UowInner {
                state,
                outbox: Vec::new(),
            })),
        }
    }

    /// Runs `f` atomically against the state and an outbox batch.
    ///
    /// Either every mutation and every staged record commits, or none do.
    pub async fn transact<T, E>(
        &self,
        f: impl FnOnce(&mut S, &mut OutboxBatch) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let mut inner = self.inner.write().await;
        let mut working = inner.state.clone();
        let mut batch = OutboxBatch::default();

        match f(&mut working, &mut batch) {
            Ok(value) => {
                inner.state = working;
                inner.outbox.extend(batch.records);
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs a read-only closure against the current state.
    pub async fn read<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let inner = self.inner.read().await;
        f(&inner.state)
    }

    /// Returns every outbox record, for assertions and audit.
    pub async fn records(&self) -> Vec<OutboxRecord> {
        self.inner.read().await.outbox.clone()
    }
}

impl<S: Default + Clone + Send + Sync> Default for InMemoryUnitOfWork<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[async_trait]
impl<S> OutboxStore for InMemoryUnitOfWork<S>
where
    S: Clone + Send + Sync,
{
    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<_> = inner
            .outbox
            .iter()
            .filter(|r| !r.published)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_published(&self, id: EventId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .outbox
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(OutboxError::RecordNotFound(id))?;
        record.published = true;
        record.published_at = Some(Utc::now());
        Ok(())
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self
            .inner
            .read()
            .await
            .outbox
            .iter()
            .filter(|r| !r.published)
            .count())
    }

    async fn stream_records(&self) -> Result<RecordStream> {
        let records = self.inner.read().await.outbox.clone();
        Ok(Box::pin(futures_util::stream::iter(
            records.into_iter().map(Ok),
        )))
    }
}
