use chrono::{DateTime, Utc};
use event_bus::{EventEnvelope, EventId, IntegrationEvent};
use serde::{Deserialize, Serialize};

/// A not-yet-published event, durably logged next to the state change that
/// produced it.
///
/// Records are inserted in the same local transaction as that state change
/// and mutated only by the relay, which flips `published`. They are never
/// deleted; the log doubles as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Record ID, reused as the envelope's event ID on publish so consumer
    /// deduplication survives republish.
    pub id: EventId,

    /// The wire name of the serialized event.
    pub event_type: String,

    /// The event payload, serialized as JSON text.
    pub payload: String,

    /// When the record was written (also the event's occurrence time).
    pub created_at: DateTime<Utc>,

    /// Whether the relay has successfully published this record.
    pub published: bool,

    /// When the record was published, if it has been.
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Creates a pending record for an integration event.
    pub fn for_event<E: IntegrationEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: EventId::new(),
            event_type: E::EVENT_TYPE.to_string(),
            payload: serde_json::to_string(event)?,
            created_at: Utc::now(),
            published: false,
            published_at: None,
        })
    }

    /// Reconstructs the envelope this record describes.
    ///
    /// Fails if the stored payload is not valid JSON; the relay routes such
    /// records to the dead-letter store instead of retrying them forever.
    pub fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;
        Ok(EventEnvelope::from_parts(
            self.id,
            self.event_type.clone(),
            self.created_at,
            payload,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderNo;
    use event_bus::InventoryReserved;

    #[test]
    fn for_event_starts_pending() {
        let record = OutboxRecord::for_event(&InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: true,
            reason: None,
        })
        .unwrap();

        assert_eq!(record.event_type, "InventoryReserved");
        assert!(!record.published);
        assert!(record.published_at.is_none());
    }

    #[test]
    fn to_envelope_keeps_the_record_id() {
        let record = OutboxRecord::for_event(&InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: true,
            reason: None,
        })
        .unwrap();

        let envelope = record.to_envelope().unwrap();
        assert_eq!(envelope.event_id, record.id);
        assert_eq!(envelope.event_type, "InventoryReserved");

        let decoded: InventoryReserved = envelope.decode().unwrap();
        assert_eq!(decoded.order_no, OrderNo::new("ORD-1"));
    }

    #[test]
    fn corrupt_payload_is_detected() {
        let mut record = OutboxRecord::for_event(&InventoryReserved {
            order_no: OrderNo::new("ORD-1"),
            success: true,
            reason: None,
        })
        .unwrap();
        record.payload = "{not json".to_string();

        assert!(record.to_envelope().is_err());
    }
}
