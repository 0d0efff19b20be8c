use chrono::{DateTime, Utc};
use consultpay_core::{AccountId, BookingId, ConsultantId, PayoutId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingSettledEvent {
    pub booking: BookingId,
    pub user: AccountId,
    pub consultant: ConsultantId,
    pub amount_user_pays: Decimal,
    pub consultant_earning: Decimal,
    pub platform_commission: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementFailedEvent {
    pub booking: BookingId,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommissionSubsidisedEvent {
    pub booking: BookingId,
    pub consultant: ConsultantId,
    pub platform_commission: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutRecordedEvent {
    pub payout: PayoutId,
    pub consultant: ConsultantId,
    pub consultant_name: String,
    pub consultant_email: Option<String>,
    pub amount: Decimal,
    pub outstanding_after: Decimal,
    pub notes: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntegrityWarningEvent {
    pub consultant: ConsultantId,
    pub outstanding: Decimal,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    BookingSettled(BookingSettledEvent),
    SettlementFailed(SettlementFailedEvent),
    CommissionSubsidised(CommissionSubsidisedEvent),
    PayoutRecorded(PayoutRecordedEvent),
    IntegrityWarning(IntegrityWarningEvent),
}

/// Event with a unique id so at-least-once consumers can deduplicate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub emitted_at: DateTime<Utc>,
    pub event: Event,
}

/// Fire-and-forget broadcast bus. Publishing never blocks and never fails the caller.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Envelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event; returns the envelope id. Dropped silently if nobody listens.
    pub fn publish(&self, event: Event) -> Uuid {
        let envelope = Envelope {
            id: Uuid::new_v4(),
            emitted_at: Utc::now(),
            event,
        };
        let id = envelope.id;
        let _ = self.sender.send(envelope);
        id
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

pub struct EventStream {
    receiver: broadcast::Receiver<Envelope>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Result<Envelope, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Take the next buffered envelope without waiting.
    pub fn try_recv(&mut self) -> Result<Envelope, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut stream = bus.subscribe();
        let id = bus.publish(Event::SettlementFailed(SettlementFailedEvent {
            booking: BookingId(42),
            reason: "insufficient funds".into(),
        }));
        let envelope = stream.recv().await.unwrap();
        assert_eq!(envelope.id, id);
        assert!(matches!(
            envelope.event,
            Event::SettlementFailed(SettlementFailedEvent { booking, .. }) if booking == BookingId(42)
        ));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::new(8);
        bus.publish(Event::IntegrityWarning(IntegrityWarningEvent {
            consultant: ConsultantId(1),
            outstanding: dec!(-10),
            message: "overpaid".into(),
        }));
        let mut late = bus.subscribe();
        drop(bus);
        assert!(late.recv().await.is_err());
    }
}
