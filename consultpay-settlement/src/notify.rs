use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consultpay_events::{Event, EventStream, PayoutRecordedEvent};
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification endpoint rejected the message with status {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for NotifyError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Delivers consultant-facing messages. Implementations may be slow or fail;
/// the dispatcher keeps them off the payout write path.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payout_recorded(&self, event: &PayoutRecordedEvent) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn payout_recorded(&self, event: &PayoutRecordedEvent) -> Result<(), NotifyError> {
        info!(
            consultant_id = %event.consultant,
            email = ?event.consultant_email,
            amount = %event.amount,
            "payout notification (log only)"
        );
        Ok(())
    }
}

/// Posts notifications as JSON to a mail relay webhook.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn payout_recorded(&self, event: &PayoutRecordedEvent) -> Result<(), NotifyError> {
        let body = json!({
            "template": "payout_recorded",
            "to": event.consultant_email,
            "subject": format!("Payout of {} recorded", event.amount),
            "consultant": event.consultant_name,
            "payout": event,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Delivery counters reported when the dispatcher stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Consumes bus events and forwards payout notifications with bounded retries.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    max_attempts: u32,
    backoff: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Run until every publisher is dropped.
    pub fn spawn(self, stream: EventStream) -> JoinHandle<DispatchStats> {
        tokio::spawn(async move { self.run(stream).await })
    }

    pub async fn run(self, mut stream: EventStream) -> DispatchStats {
        let mut stats = DispatchStats::default();
        loop {
            let envelope = match stream.recv().await {
                Ok(envelope) => envelope,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "notification dispatcher lagged; events dropped");
                    stats.skipped += missed as usize;
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match &envelope.event {
                Event::PayoutRecorded(event) => {
                    if self.deliver(event).await {
                        stats.delivered += 1;
                    } else {
                        stats.failed += 1;
                    }
                }
                Event::BookingSettled(_)
                | Event::SettlementFailed(_)
                | Event::CommissionSubsidised(_)
                | Event::IntegrityWarning(_) => {
                    debug!(event_id = %envelope.id, "event needs no notification");
                }
            }
        }
        stats
    }

    async fn deliver(&self, event: &PayoutRecordedEvent) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.notifier.payout_recorded(event).await {
                Ok(()) => return true,
                Err(err) => {
                    warn!(
                        payout_id = %event.payout,
                        attempt,
                        error = %err,
                        "payout notification failed"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }
        false
    }
}
