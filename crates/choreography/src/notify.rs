use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// A notification send failed.
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget customer notification.
///
/// The saga calls this after terminal outcomes but never depends on the
/// result; handlers log a failed send and move on.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sends an email.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), NotifyError>;

    /// Sends an SMS.
    async fn send_sms(&self, to: &str, body: &str) -> std::result::Result<(), NotifyError>;
}

/// A sent (or attempted) notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub channel: &'static str,
    pub to: String,
    pub body: String,
}

/// Recording notification sender for tests.
#[derive(Clone, Default)]
pub struct RecordingNotificationSender {
    sent: Arc<RwLock<Vec<SentNotification>>>,
    fail: Arc<RwLock<bool>>,
}

impl RecordingNotificationSender {
    /// Creates a sender that records every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Returns everything sent so far.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotificationSender {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), NotifyError> {
        if *self.fail.read().await {
            return Err(NotifyError("smtp unavailable".to_string()));
        }
        self.sent.write().await.push(SentNotification {
            channel: "email",
            to: to.to_string(),
            body: format!("{subject}: {body}"),
        });
        Ok(())
    }

    async fn send_sms(&self, to: &str, body: &str) -> std::result::Result<(), NotifyError> {
        if *self.fail.read().await {
            return Err(NotifyError("sms gateway unavailable".to_string()));
        }
        self.sent.write().await.push(SentNotification {
            channel: "sms",
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends() {
        let sender = RecordingNotificationSender::new();
        sender
            .send_email("a@example.com", "Order update", "shipped")
            .await
            .unwrap();

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "email");
        assert_eq!(sent[0].body, "Order update: shipped");
    }

    #[tokio::test]
    async fn fail_mode_errors_without_recording() {
        let sender = RecordingNotificationSender::new();
        sender.set_fail(true).await;

        assert!(sender.send_sms("+1555", "hi").await.is_err());
        assert!(sender.sent().await.is_empty());
    }
}
