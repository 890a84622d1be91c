use common::{AuditInfo, IdempotencyKey, Money, OrderNo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::PaymentStatus;

/// Unique identifier for a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random payment ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a payment ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the customer pays; selects the provider adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// The simulated gateway used in development and tests.
    FakeGateway,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::FakeGateway => "fake_gateway",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment attempt for an order.
///
/// Created once per distinct idempotency key; the key's uniqueness is what
/// makes creation retry-safe. `external_ref` is the provider's reference
/// from the create round-trip and is how webhook callbacks find their way
/// back to the payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_no: OrderNo,
    pub idempotency_key: IdempotencyKey,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub external_ref: Option<String>,
    pub raw_callback_payload: Option<String>,
    pub audit: AuditInfo,
}

impl Payment {
    /// Creates a new payment in `Processing`.
    pub fn new(
        order_no: OrderNo,
        idempotency_key: IdempotencyKey,
        amount: Money,
        method: PaymentMethod,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            order_no,
            idempotency_key,
            amount,
            method,
            status: PaymentStatus::Processing,
            external_ref: None,
            raw_callback_payload: None,
            audit: AuditInfo::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_payment_starts_processing() {
        let payment = Payment::new(
            OrderNo::new("ORD-1"),
            IdempotencyKey::new("K1"),
            Money::from_cents(1000),
            PaymentMethod::FakeGateway,
        );
        assert_eq!(payment.status, PaymentStatus::Processing);
        assert!(payment.external_ref.is_none());
        assert!(payment.raw_callback_payload.is_none());
    }

    #[test]
    fn method_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::FakeGateway).unwrap(),
            "\"fake_gateway\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
    }

    #[test]
    fn payment_ids_are_unique() {
        assert_ne!(PaymentId::new(), PaymentId::new());
    }
}
