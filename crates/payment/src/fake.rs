use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use event_bus::PaymentOutcome;
use serde::Deserialize;

use crate::model::Payment;
use crate::provider::{CallbackNotice, PaymentProvider, ProviderCheckout, ProviderError};

#[derive(Debug, Default)]
struct FakeState {
    next_ref: u32,
    decline_reason: Option<String>,
    unavailable: bool,
    create_delay: Option<Duration>,
    create_count: u32,
}

/// Simulated payment gateway.
///
/// Hands out deterministic `FAKE-n` references and accepts callback bodies
/// of its own making. Knobs let tests force declines, outages and slow
/// responses.
#[derive(Debug, Clone, Default)]
pub struct FakeGatewayProvider {
    state: Arc<RwLock<FakeState>>,
}

#[derive(Deserialize)]
struct FakeCallbackBody {
    provider_ref: String,
    status: String,
    reason: Option<String>,
}

impl FakeGatewayProvider {
    /// Creates a well-behaved fake gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent create calls fail as a business decline.
    pub fn set_decline(&self, reason: Option<&str>) {
        self.state.write().unwrap().decline_reason = reason.map(str::to_string);
    }

    /// Makes subsequent create calls fail as an unreachable provider.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Delays subsequent create calls, to exercise caller timeouts.
    pub fn set_create_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().create_delay = delay;
    }

    /// Returns how many create round-trips reached the gateway.
    pub fn create_count(&self) -> u32 {
        self.state.read().unwrap().create_count
    }

    /// Builds the webhook body the real gateway would send for an outcome.
    pub fn callback_body(
        provider_ref: &str,
        outcome: PaymentOutcome,
        reason: Option<&str>,
    ) -> String {
        serde_json::json!({
            "provider_ref": provider_ref,
            "status": outcome.as_str(),
            "reason": reason,
        })
        .to_string()
    }
}

#[async_trait]
impl PaymentProvider for FakeGatewayProvider {
    async fn create(&self, _payment: &Payment) -> Result<ProviderCheckout, ProviderError> {
        let delay = self.state.read().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        state.create_count += 1;

        if state.unavailable {
            return Err(ProviderError::Unavailable(
                "fake gateway unreachable".to_string(),
            ));
        }
        if let Some(reason) = &state.decline_reason {
            return Err(ProviderError::Rejected(reason.clone()));
        }

        state.next_ref += 1;
        let provider_ref = format!("FAKE-{:06}", state.next_ref);
        Ok(ProviderCheckout {
            redirect_url: Some(format!("https://pay.fake.test/checkout/{provider_ref}")),
            provider_ref,
        })
    }

    fn verify_callback(&self, raw_body: &str) -> Result<CallbackNotice, ProviderError> {
        let body: FakeCallbackBody = serde_json::from_str(raw_body)
            .map_err(|e| ProviderError::InvalidCallback(e.to_string()))?;

        let outcome = match body.status.as_str() {
            "Succeeded" => PaymentOutcome::Succeeded,
            "Failed" => PaymentOutcome::Failed,
            other => {
                return Err(ProviderError::InvalidCallback(format!(
                    "unknown status '{other}'"
                )));
            }
        };

        Ok(CallbackNotice {
            provider_ref: body.provider_ref,
            outcome,
            reason: body.reason,
        })
    }
}
