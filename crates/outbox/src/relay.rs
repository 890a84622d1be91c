use std::sync::Arc;
use std::time::Duration;

use event_bus::EventBus;
use tokio::sync::oneshot;

use crate::Result;
use crate::dead_letter::{DeadLetter, DeadLetterStore};
use crate::store::OutboxStore;

/// Relay tuning, loaded from the environment with defaults.
///
/// Environment variables:
/// - `OUTBOX_POLL_INTERVAL_MS`: idle poll period (default: `100`)
/// - `OUTBOX_BACKOFF_BASE_MS`: first retry delay after a publish failure (default: `50`)
/// - `OUTBOX_BACKOFF_MAX_MS`: retry delay ceiling (default: `5000`)
/// - `OUTBOX_BATCH_SIZE`: max records per drain (default: `64`)
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub batch_size: usize,
}

impl RelayConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        fn env_ms(key: &str, default: u64) -> Duration {
            Duration::from_millis(
                std::env::var(key)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        }

        Self {
            poll_interval: env_ms("OUTBOX_POLL_INTERVAL_MS", 100),
            backoff_base: env_ms("OUTBOX_BACKOFF_BASE_MS", 50),
            backoff_max: env_ms("OUTBOX_BACKOFF_MAX_MS", 5000),
            batch_size: std::env::var("OUTBOX_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            backoff_base: Duration::from_millis(50),
            backoff_max: Duration::from_secs(5),
            batch_size: 64,
        }
    }
}

/// Outcome of a single drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Records successfully published and marked.
    pub published: usize,
    /// Records routed to the dead-letter store.
    pub dead_lettered: usize,
    /// True if a publish failed and pending records remain.
    pub transport_failed: bool,
}

/// Background process that drains an outbox and publishes to the bus.
///
/// Pending rows are processed oldest first. A transport failure stops the
/// current pass (preserving per-outbox publish order) and leaves the row
/// pending; retries back off exponentially and are unbounded. Publish and
/// mark-published run in separate transactions, so a crash in between
/// re-delivers the record; downstream idempotency absorbs the duplicate.
pub struct OutboxRelay<S, B>
where
    S: OutboxStore,
    B: EventBus,
{
    store: S,
    bus: B,
    dead_letters: Arc<dyn DeadLetterStore>,
    config: RelayConfig,
}

impl<S, B> OutboxRelay<S, B>
where
    S: OutboxStore,
    B: EventBus,
{
    /// Creates a relay over one service's outbox.
    pub fn new(store: S, bus: B, dead_letters: Arc<dyn DeadLetterStore>) -> Self {
        Self::with_config(store, bus, dead_letters, RelayConfig::default())
    }

    /// Creates a relay with explicit tuning.
    pub fn with_config(
        store: S,
        bus: B,
        dead_letters: Arc<dyn DeadLetterStore>,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            bus,
            dead_letters,
            config,
        }
    }

    /// Performs one drain pass: fetch pending records, publish, mark.
    #[tracing::instrument(skip(self))]
    pub async fn drain_once(&self) -> Result<DrainStats> {
        let start = std::time::Instant::now();
        let pending = self.store.fetch_unpublished(self.config.batch_size).await?;
        let mut stats = DrainStats::default();

        for record in pending {
            let envelope = match record.to_envelope() {
                Ok(envelope) => envelope,
                Err(e) => {
                    // Poison row: park it and acknowledge so it never
                    // blocks the rows behind it.
                    self.dead_letters
                        .push(DeadLetter::new(
                            record.clone(),
                            format!("corrupted payload: {e}"),
                        ))
                        .await?;
                    self.store.mark_published(record.id).await?;
                    metrics::counter!("outbox_dead_letters_total").increment(1);
                    stats.dead_lettered += 1;
                    continue;
                }
            };

            match self.bus.publish(envelope).await {
                Ok(()) => {
                    self.store.mark_published(record.id).await?;
                    metrics::counter!("outbox_published_total").increment(1);
                    stats.published += 1;
                }
                Err(e) => {
                    // Transient transport failure: leave the row pending and
                    // stop this pass so records keep their insertion order.
                    metrics::counter!("outbox_publish_failures_total").increment(1);
                    tracing::warn!(
                        event_id = %record.id,
                        event_type = %record.event_type,
                        error = %e,
                        "publish failed, will retry"
                    );
                    stats.transport_failed = true;
                    break;
                }
            }
        }

        metrics::histogram!("outbox_drain_seconds").record(start.elapsed().as_secs_f64());
        Ok(stats)
    }

    /// Runs the relay until the shutdown signal fires.
    ///
    /// Polls at `poll_interval` while healthy; after consecutive failed
    /// passes the delay grows as `backoff_base * 2^n`, capped at
    /// `backoff_max`, and resets on the first successful pass.
    #[tracing::instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) {
        let mut consecutive_failures: u32 = 0;

        loop {
            let delay = if consecutive_failures == 0 {
                self.config.poll_interval
            } else {
                self.backoff_delay(consecutive_failures)
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("relay shutting down");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            match self.drain_once().await {
                Ok(stats) if stats.transport_failed => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
                Ok(_) => {
                    consecutive_failures = 0;
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    tracing::error!(error = %e, "drain pass failed");
                }
            }
        }
    }

    fn backoff_delay(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        let delay = self
            .config
            .backoff_base
            .saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.config.backoff_max)
    }

    /// Returns the dead-letter store this relay routes poison rows to.
    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterStore> {
        &self.dead_letters
    }
}
