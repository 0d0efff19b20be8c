use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use consultpay_core::{ConsultantId, PayoutId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

impl PayoutStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PayoutStatus::Pending),
            "PAID" => Ok(PayoutStatus::Paid),
            other => Err(format!("unknown payout status: {other}")),
        }
    }
}

/// Record of an off-platform transfer to a consultant. Only `notes` may change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: PayoutId,
    pub consultant: ConsultantId,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Payout request handed to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPayout {
    pub consultant: ConsultantId,
    pub amount: Decimal,
    pub notes: Option<String>,
    /// Outstanding balance the operator saw; the write is rejected if it moved.
    pub expected_outstanding: Option<Decimal>,
}

/// Result of a committed payout with the outstanding balance on both sides of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutCommit {
    pub payout: Payout,
    pub outstanding_before: Decimal,
    pub outstanding_after: Decimal,
}
