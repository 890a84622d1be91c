use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use event_bus::PaymentOutcome;
use thiserror::Error;

use crate::model::{Payment, PaymentMethod};

/// Errors a provider adapter can report.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the charge (a business outcome).
    #[error("Provider rejected the payment: {0}")]
    Rejected(String),

    /// The provider could not be reached or answered with an infra failure.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// A callback body failed validation.
    #[error("Invalid callback payload: {0}")]
    InvalidCallback(String),
}

/// The provider's answer to a create round-trip.
#[derive(Debug, Clone)]
pub struct ProviderCheckout {
    /// The provider's reference for this payment; webhook callbacks quote it.
    pub provider_ref: String,
    /// Where to send the customer to complete the payment, if applicable.
    pub redirect_url: Option<String>,
}

/// A validated webhook callback.
#[derive(Debug, Clone)]
pub struct CallbackNotice {
    /// The provider reference quoted in the callback.
    pub provider_ref: String,
    /// The terminal outcome the provider reports.
    pub outcome: PaymentOutcome,
    /// Failure detail, if the outcome is `Failed`.
    pub reason: Option<String>,
}

/// Adapter for one external payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Initiates a payment with the provider.
    async fn create(&self, payment: &Payment) -> Result<ProviderCheckout, ProviderError>;

    /// Validates a raw webhook body and extracts the reported outcome.
    ///
    /// Validation is provider-defined; the fake adapter trusts its own
    /// well-formed JSON bodies.
    fn verify_callback(&self, raw_body: &str) -> Result<CallbackNotice, ProviderError>;
}

/// Explicit, data-driven provider selection by payment method.
///
/// Construction-time registration; no ambient lookup and no reflection.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider for a method, replacing any previous one.
    pub fn register(
        mut self,
        method: PaymentMethod,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        self.providers.insert(method, provider);
        self
    }

    /// Returns the provider for a method, if registered.
    pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&method).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeGatewayProvider;

    #[test]
    fn registry_resolves_registered_methods_only() {
        let registry = ProviderRegistry::new().register(
            PaymentMethod::FakeGateway,
            Arc::new(FakeGatewayProvider::new()),
        );

        assert!(registry.get(PaymentMethod::FakeGateway).is_some());
        assert!(registry.get(PaymentMethod::Card).is_none());
    }
}
