use async_trait::async_trait;

use crate::envelope::EventEnvelope;
use crate::error::Result;

/// A consumer of delivered envelopes.
///
/// A handler is invoked once per delivered envelope, possibly more than
/// once under redelivery (crash before acknowledgment, network partition).
/// Implementations MUST be idempotent: handling the same envelope twice
/// must produce the same end state as handling it once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles a single delivered envelope.
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// Publish/subscribe transport for integration events.
///
/// Publishing is best-effort, at-least-once. The bus gives no ordering
/// guarantee between distinct event types; per-key sequencing is the
/// consumer's concern.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an envelope to all subscribers of its event type.
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;

    /// Registers a handler for an event type.
    async fn subscribe(&self, event_type: &str, handler: std::sync::Arc<dyn EventHandler>);
}
