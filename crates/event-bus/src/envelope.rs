use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::{BusError, Result};

/// Unique identifier for an event.
///
/// Consumers deduplicate on this ID, so it must stay stable when the same
/// event is republished by the outbox relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A message contract that can travel in an [`EventEnvelope`].
///
/// Integration events are immutable facts named in past tense. The type
/// string is part of the wire contract and must never change once events
/// of that type have been emitted.
pub trait IntegrationEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// The wire name of this event type.
    const EVENT_TYPE: &'static str;
}

/// Immutable envelope around an integration event.
///
/// Ordering across different event types for the same business key is NOT
/// guaranteed by the bus; consumers must be order-tolerant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Globally unique event ID, used for consumer-side deduplication.
    pub event_id: EventId,

    /// The wire name of the payload's type (e.g., "OrderPlaced").
    pub event_type: String,

    /// When the event occurred at the producer.
    pub occurred_at: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wraps an integration event in a fresh envelope.
    pub fn wrap<E: IntegrationEvent>(event: &E) -> Result<Self> {
        Ok(Self {
            event_id: EventId::new(),
            event_type: E::EVENT_TYPE.to_string(),
            occurred_at: Utc::now(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// Reconstructs an envelope from stored parts, keeping the original ID.
    ///
    /// Used by the outbox relay so that republishing a record yields an
    /// envelope consumers recognize as the same event.
    pub fn from_parts(
        event_id: EventId,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    /// Decodes the payload into a concrete contract.
    ///
    /// Fails if the envelope carries a different event type or the payload
    /// does not match the contract's shape.
    pub fn decode<E: IntegrationEvent>(&self) -> Result<E> {
        if self.event_type != E::EVENT_TYPE {
            return Err(BusError::UnexpectedType {
                expected: E::EVENT_TYPE,
                actual: self.event_type.clone(),
            });
        }
        serde_json::from_value(self.payload.clone()).map_err(|source| BusError::Decode {
            event_type: self.event_type.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::InventoryReserved;
    use common::OrderNo;

    #[test]
    fn event_id_new_creates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn wrap_and_decode_roundtrip() {
        let event = InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: true,
            reason: None,
        };

        let envelope = EventEnvelope::wrap(&event).unwrap();
        assert_eq!(envelope.event_type, "InventoryReserved");

        let back: InventoryReserved = envelope.decode().unwrap();
        assert_eq!(back.order_no, event.order_no);
        assert!(back.success);
    }

    #[test]
    fn decode_rejects_wrong_type() {
        let event = InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: false,
            reason: Some("insufficient_stock:SKU-A".to_string()),
        };
        let envelope = EventEnvelope::wrap(&event).unwrap();

        let result = envelope.decode::<crate::contracts::OrderPlaced>();
        assert!(matches!(result, Err(BusError::UnexpectedType { .. })));
    }

    #[test]
    fn from_parts_keeps_the_id() {
        let event = InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: true,
            reason: None,
        };
        let original = EventEnvelope::wrap(&event).unwrap();

        let rebuilt = EventEnvelope::from_parts(
            original.event_id,
            original.event_type.clone(),
            original.occurred_at,
            original.payload.clone(),
        );
        assert_eq!(rebuilt.event_id, original.event_id);
    }
}
