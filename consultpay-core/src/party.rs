use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, ConsultantId, Percent};

/// A marketplace participant that owns exactly one wallet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: AccountId,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Consultant profile with its pricing and optional commission overrides.
///
/// `None` on either override means the platform-wide default applies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Consultant {
    pub id: ConsultantId,
    /// Ledger account that receives earnings for this consultant.
    pub account: AccountId,
    pub name: String,
    pub email: Option<String>,
    pub hourly_price: Decimal,
    pub consultant_commission_pct: Option<Percent>,
    pub user_commission_pct: Option<Percent>,
}

/// Commission overrides applied to a single consultant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionOverrides {
    pub consultant_pct: Option<Percent>,
    pub user_pct: Option<Percent>,
}

impl Consultant {
    pub fn overrides(&self) -> CommissionOverrides {
        CommissionOverrides {
            consultant_pct: self.consultant_commission_pct,
            user_pct: self.user_commission_pct,
        }
    }
}

/// Singleton platform configuration row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub default_consultant_comm: Percent,
    pub default_user_comm: Percent,
    pub updated_at: DateTime<Utc>,
}
