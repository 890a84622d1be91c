//! Payment service state held in a transactional unit of work.

use std::collections::HashMap;

use common::{IdempotencyKey, OrderNo};
use outbox::InMemoryUnitOfWork;

use crate::model::Payment;

/// The payment service's tables: payments by idempotency key plus the
/// lookup indexes the callback and compensation paths need.
#[derive(Debug, Clone, Default)]
pub struct PaymentState {
    pub payments: HashMap<IdempotencyKey, Payment>,
    pub by_ref: HashMap<String, IdempotencyKey>,
    pub by_order: HashMap<OrderNo, IdempotencyKey>,
}

impl PaymentState {
    /// Looks up a payment by the provider's external reference.
    pub fn by_external_ref(&self, provider_ref: &str) -> Option<&Payment> {
        self.by_ref
            .get(provider_ref)
            .and_then(|key| self.payments.get(key))
    }

    /// Looks up a payment by order number.
    pub fn by_order_no(&self, order_no: &OrderNo) -> Option<&Payment> {
        self.by_order
            .get(order_no)
            .and_then(|key| self.payments.get(key))
    }

    /// Inserts a payment and maintains the indexes.
    pub fn insert(&mut self, payment: Payment) {
        if let Some(provider_ref) = &payment.external_ref {
            self.by_ref
                .insert(provider_ref.clone(), payment.idempotency_key.clone());
        }
        self.by_order
            .insert(payment.order_no.clone(), payment.idempotency_key.clone());
        self.payments
            .insert(payment.idempotency_key.clone(), payment);
    }
}

/// Unit of work over [`PaymentState`]; every mutation commits atomically
/// with the outbox records it stages.
pub type PaymentUow = InMemoryUnitOfWork<PaymentState>;
