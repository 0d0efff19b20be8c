use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, BookingId, ConsultantId, CoreError, CoreResult};

/// Lifecycle of a booked session.
///
/// `Settled`, `Cancelled` and `Rejected` are terminal. Only `Confirmed` and
/// `Completed` bookings may be settled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Settled,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Settled => "SETTLED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Settled | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    pub fn is_settleable(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Completed)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Pending, Rejected)
                | (Confirmed, Completed)
                | (Confirmed, Settled)
                | (Confirmed, Cancelled)
                | (Confirmed, Rejected)
                | (Completed, Settled)
        )
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: BookingStatus) -> CoreResult<BookingStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "SETTLED" => Ok(BookingStatus::Settled),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REJECTED" => Ok(BookingStatus::Rejected),
            other => Err(CoreError::UnknownVariant {
                kind: "booking status",
                value: other.to_string(),
            }),
        }
    }
}

/// Money figures frozen on a booking when it settles.
///
/// These are never recomputed, even if commission percentages change later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSnapshot {
    pub consultant_fee: Decimal,
    pub amount_deducted_from_user: Decimal,
    pub commission_fee: Decimal,
    pub consultant_earning: Decimal,
    pub subsidised: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user: AccountId,
    pub consultant: ConsultantId,
    pub status: BookingStatus,
    pub snapshot: Option<BookingSnapshot>,
    /// Last settlement failure, kept for the booking collaborator's retry policy.
    pub settlement_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}
