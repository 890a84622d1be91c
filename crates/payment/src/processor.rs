use std::time::Duration;

use chrono::Utc;
use common::{IdempotencyKey, KeyedLock, Money, OrderNo};
use event_bus::{PaymentCompleted, PaymentOutcome};

use crate::error::{PaymentError, Result};
use crate::model::{Payment, PaymentMethod};
use crate::provider::{ProviderError, ProviderRegistry};
use crate::status::PaymentStatus;
use crate::store::PaymentUow;

/// Default bound on the provider create round-trip.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Request to create a payment attempt.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub order_no: OrderNo,
    pub amount: Money,
    pub method: PaymentMethod,
    pub idempotency_key: IdempotencyKey,
}

/// Outcome of a refund attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// The payment was reversed.
    Refunded,
    /// The payment is not in a refundable state; nothing changed.
    NotRefundable(PaymentStatus),
    /// No payment exists for the order; nothing changed.
    NoPayment,
}

/// Creates idempotent payment attempts and drives them to a terminal state.
///
/// A payment is created once per distinct idempotency key; repeat create
/// calls return the stored payment unchanged, whatever their arguments.
/// Terminal transitions (callback, decline, expiry) emit `PaymentCompleted`
/// through the outbox in the same transaction as the status change.
pub struct PaymentProcessor {
    uow: PaymentUow,
    providers: ProviderRegistry,
    locks: KeyedLock,
    call_timeout: Duration,
}

impl PaymentProcessor {
    /// Creates a processor with the default provider-call timeout.
    pub fn new(uow: PaymentUow, providers: ProviderRegistry) -> Self {
        Self::with_call_timeout(uow, providers, DEFAULT_CALL_TIMEOUT)
    }

    /// Creates a processor with an explicit provider-call timeout.
    pub fn with_call_timeout(
        uow: PaymentUow,
        providers: ProviderRegistry,
        call_timeout: Duration,
    ) -> Self {
        Self {
            uow,
            providers,
            locks: KeyedLock::new(),
            call_timeout,
        }
    }

    /// Returns the underlying unit of work (the service's outbox).
    pub fn uow(&self) -> &PaymentUow {
        &self.uow
    }

    /// Returns the payment for an order, if one exists.
    pub async fn get(&self, order_no: &OrderNo) -> Option<Payment> {
        self.uow
            .read(|state| state.by_order_no(order_no).cloned())
            .await
    }

    /// Returns the payment for an idempotency key, if one exists.
    pub async fn get_by_key(&self, key: &IdempotencyKey) -> Option<Payment> {
        self.uow.read(|state| state.payments.get(key).cloned()).await
    }

    /// Creates a payment attempt, or returns the existing one for the key.
    ///
    /// Business declines (non-positive amount, provider rejection) come
    /// back as an `Ok` payment in `Failed` with the negative
    /// `PaymentCompleted` already staged; only infrastructure problems
    /// (unknown method, unreachable provider) are errors. A provider call
    /// that exceeds the timeout leaves the payment in `Processing` for
    /// [`reconcile_stale`](Self::reconcile_stale) to expire later.
    #[tracing::instrument(skip(self, cmd), fields(order_no = %cmd.order_no, key = %cmd.idempotency_key))]
    pub async fn create(&self, cmd: CreatePayment) -> Result<Payment> {
        let _guard = self.locks.acquire(cmd.idempotency_key.as_str()).await;

        if let Some(existing) = self.get_by_key(&cmd.idempotency_key).await {
            metrics::counter!("payment_duplicate_creates_total").increment(1);
            tracing::debug!(payment_id = %existing.id, "duplicate create, returning stored payment");
            return Ok(existing);
        }

        let mut payment = Payment::new(
            cmd.order_no.clone(),
            cmd.idempotency_key.clone(),
            cmd.amount,
            cmd.method,
        );

        if !cmd.amount.is_positive() {
            payment.status = PaymentStatus::Failed;
            let reason = format!("invalid_amount:{}", cmd.amount.cents());
            tracing::info!(%reason, "payment rejected before provider call");
            self.commit_new(&payment, Some(reason)).await?;
            metrics::counter!("payment_failures_total").increment(1);
            return Ok(payment);
        }

        let provider = self
            .providers
            .get(cmd.method)
            .ok_or(PaymentError::UnknownMethod(cmd.method))?;

        match tokio::time::timeout(self.call_timeout, provider.create(&payment)).await {
            Ok(Ok(checkout)) => {
                payment.external_ref = Some(checkout.provider_ref);
            }
            Ok(Err(ProviderError::Rejected(reason))) => {
                payment.status = PaymentStatus::Failed;
                tracing::info!(%reason, "provider declined the payment");
                self.commit_new(&payment, Some(reason)).await?;
                metrics::counter!("payment_failures_total").increment(1);
                return Ok(payment);
            }
            Ok(Err(e)) => {
                // Infra failure before anything was persisted: surface it
                // and let the caller (or redelivery) retry the create.
                return Err(PaymentError::Provider(e));
            }
            Err(_elapsed) => {
                metrics::counter!("payment_provider_timeouts_total").increment(1);
                tracing::warn!(
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "provider call timed out; payment stays Processing for reconciliation"
                );
            }
        }

        self.commit_new(&payment, None).await?;
        metrics::counter!("payment_creations_total").increment(1);
        tracing::info!(payment_id = %payment.id, "payment attempt created");
        Ok(payment)
    }

    /// Applies a provider webhook callback.
    ///
    /// Validates the body with the method's provider, locates the payment
    /// by the quoted reference, and transitions `Processing` to the
    /// reported terminal state, staging `PaymentCompleted` in the same
    /// transaction. Callbacks for payments already in a terminal state are
    /// no-ops, which makes duplicate webhook delivery harmless.
    #[tracing::instrument(skip(self, raw_body))]
    pub async fn handle_callback(
        &self,
        raw_body: &str,
        method: PaymentMethod,
    ) -> Result<Payment> {
        let provider = self
            .providers
            .get(method)
            .ok_or(PaymentError::UnknownMethod(method))?;
        let notice = provider.verify_callback(raw_body)?;

        let key = self
            .uow
            .read(|state| state.by_ref.get(&notice.provider_ref).cloned())
            .await
            .ok_or_else(|| PaymentError::UnknownReference(notice.provider_ref.clone()))?;

        let _guard = self.locks.acquire(key.as_str()).await;

        let payment = self
            .uow
            .transact::<_, PaymentError>(|state, batch| {
                let payment = state
                    .payments
                    .get_mut(&key)
                    .ok_or_else(|| PaymentError::UnknownReference(notice.provider_ref.clone()))?;

                if payment.status.is_terminal() {
                    tracing::debug!(
                        payment_id = %payment.id,
                        status = %payment.status,
                        "duplicate callback against terminal payment, no-op"
                    );
                    return Ok(payment.clone());
                }

                payment.status = match notice.outcome {
                    PaymentOutcome::Succeeded => PaymentStatus::Succeeded,
                    PaymentOutcome::Failed => PaymentStatus::Failed,
                };
                payment.raw_callback_payload = Some(raw_body.to_string());
                payment.audit.touch();

                let snapshot = payment.clone();
                batch.add_event(&PaymentCompleted {
                    order_no: snapshot.order_no.clone(),
                    payment_id: snapshot.id.to_string(),
                    status: notice.outcome,
                    paid_amount: snapshot.amount,
                    reason: notice.reason.clone(),
                })?;
                Ok(snapshot)
            })
            .await?;

        match payment.status {
            PaymentStatus::Succeeded => {
                metrics::counter!("payment_successes_total").increment(1);
            }
            PaymentStatus::Failed => {
                metrics::counter!("payment_failures_total").increment(1);
            }
            _ => {}
        }
        tracing::info!(
            payment_id = %payment.id,
            order_no = %payment.order_no,
            status = %payment.status,
            "callback applied"
        );
        Ok(payment)
    }

    /// Reverses a succeeded payment for an order.
    ///
    /// The compensation path: invoked when inventory reservation fails
    /// after a payment already went through. Anything not in `Succeeded`
    /// is a logged no-op.
    #[tracing::instrument(skip(self), fields(order_no = %order_no))]
    pub async fn refund(&self, order_no: &OrderNo) -> Result<RefundOutcome> {
        let Some(key) = self
            .uow
            .read(|state| state.by_order.get(order_no).cloned())
            .await
        else {
            tracing::debug!(%order_no, "no payment to refund");
            return Ok(RefundOutcome::NoPayment);
        };

        let _guard = self.locks.acquire(key.as_str()).await;

        let outcome = self
            .uow
            .transact::<_, PaymentError>(|state, _| {
                let payment = state
                    .payments
                    .get_mut(&key)
                    .ok_or_else(|| PaymentError::NoPayment(order_no.clone()))?;

                if !payment.status.can_refund() {
                    return Ok(RefundOutcome::NotRefundable(payment.status));
                }
                payment.status = PaymentStatus::Refunded;
                payment.audit.touch();
                Ok(RefundOutcome::Refunded)
            })
            .await?;

        match outcome {
            RefundOutcome::Refunded => {
                metrics::counter!("payment_refunds_total").increment(1);
                tracing::info!(%order_no, "payment refunded");
            }
            RefundOutcome::NotRefundable(status) => {
                tracing::warn!(%order_no, %status, "refund rejected, payment not refundable");
            }
            RefundOutcome::NoPayment => {}
        }
        Ok(outcome)
    }

    /// Expires payments stuck in `Processing` longer than `max_age`.
    ///
    /// The reconciliation pass behind provider timeouts: each expired
    /// payment transitions to `Failed` and emits the negative
    /// `PaymentCompleted`. Returns how many payments were expired.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_stale(&self, max_age: Duration) -> Result<usize> {
        let expired = self
            .uow
            .transact::<_, PaymentError>(|state, batch| {
                let now = Utc::now();
                let mut expired = 0usize;

                for payment in state.payments.values_mut() {
                    if payment.status != PaymentStatus::Processing {
                        continue;
                    }
                    let old_enough = (now - payment.audit.created_at)
                        .to_std()
                        .map(|age| age >= max_age)
                        .unwrap_or(false);
                    if !old_enough {
                        continue;
                    }

                    payment.status = PaymentStatus::Failed;
                    payment.audit.touch();
                    batch.add_event(&PaymentCompleted {
                        order_no: payment.order_no.clone(),
                        payment_id: payment.id.to_string(),
                        status: PaymentOutcome::Failed,
                        paid_amount: payment.amount,
                        reason: Some("payment_timeout".to_string()),
                    })?;
                    expired += 1;
                }
                Ok(expired)
            })
            .await?;

        if expired > 0 {
            metrics::counter!("payment_expired_total").increment(expired as u64);
            tracing::warn!(expired, "expired stale processing payments");
        }
        Ok(expired)
    }

    async fn commit_new(&self, payment: &Payment, failure_reason: Option<String>) -> Result<()> {
        self.uow
            .transact::<_, PaymentError>(|state, batch| {
                if payment.status.is_terminal() {
                    batch.add_event(&PaymentCompleted {
                        order_no: payment.order_no.clone(),
                        payment_id: payment.id.to_string(),
                        status: PaymentOutcome::Failed,
                        paid_amount: payment.amount,
                        reason: failure_reason.clone(),
                    })?;
                }
                state.insert(payment.clone());
                Ok(())
            })
            .await
    }
}
