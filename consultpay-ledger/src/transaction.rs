use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use consultpay_core::{ensure_positive, AccountId, BookingId, ConsultantId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{LedgerError, LedgerResult};

/// Closed set of money movements the ledger records.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Credit,
    Debit,
    Earning,
    Commission,
    Subscription,
    ChatCredit,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 6] = [
        TransactionKind::Credit,
        TransactionKind::Debit,
        TransactionKind::Earning,
        TransactionKind::Commission,
        TransactionKind::Subscription,
        TransactionKind::ChatCredit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Credit => "CREDIT",
            TransactionKind::Debit => "DEBIT",
            TransactionKind::Earning => "EARNING",
            TransactionKind::Commission => "COMMISSION",
            TransactionKind::Subscription => "SUBSCRIPTION",
            TransactionKind::ChatCredit => "CHAT_CREDIT",
        }
    }

    /// Signed effect of one unit of this kind on the owning account's wallet.
    pub fn wallet_sign(self) -> Decimal {
        match self {
            TransactionKind::Credit
            | TransactionKind::Earning
            | TransactionKind::Subscription
            | TransactionKind::ChatCredit => Decimal::ONE,
            TransactionKind::Debit | TransactionKind::Commission => Decimal::NEGATIVE_ONE,
        }
    }

    /// Kinds written by settlement; at most one row per (booking, kind, account).
    pub fn is_settlement_leg(self) -> bool {
        match self {
            TransactionKind::Debit | TransactionKind::Earning | TransactionKind::Commission => true,
            TransactionKind::Credit | TransactionKind::Subscription | TransactionKind::ChatCredit => {
                false
            }
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(TransactionKind::Credit),
            "DEBIT" => Ok(TransactionKind::Debit),
            "EARNING" => Ok(TransactionKind::Earning),
            "COMMISSION" => Ok(TransactionKind::Commission),
            "SUBSCRIPTION" => Ok(TransactionKind::Subscription),
            "CHAT_CREDIT" => Ok(TransactionKind::ChatCredit),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }

    /// The only status mutation the ledger allows is resolving a pending row.
    pub fn can_resolve_to(self, next: TransactionStatus) -> bool {
        self == TransactionStatus::Pending && next != TransactionStatus::Pending
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "SUCCESS" => Ok(TransactionStatus::Success),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// Immutable ledger row. Ordered by `(created_at, id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub booking: Option<BookingId>,
    pub consultant: Option<ConsultantId>,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed wallet delta contributed by this row; zero unless it succeeded.
    pub fn wallet_delta(&self) -> Decimal {
        if self.status != TransactionStatus::Success {
            return Decimal::ZERO;
        }
        self.kind.wallet_sign() * self.amount
    }
}

/// A transaction that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransaction {
    pub account: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub booking: Option<BookingId>,
    pub consultant: Option<ConsultantId>,
    pub status: TransactionStatus,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn new(account: AccountId, kind: TransactionKind, amount: Decimal) -> Self {
        Self {
            account,
            kind,
            amount,
            booking: None,
            consultant: None,
            status: TransactionStatus::Success,
            description: None,
        }
    }

    pub fn for_booking(mut self, booking: BookingId) -> Self {
        self.booking = Some(booking);
        self
    }

    pub fn for_consultant(mut self, consultant: ConsultantId) -> Self {
        self.consultant = Some(consultant);
        self
    }

    /// Mark the row as awaiting a payment gateway callback.
    pub fn pending(mut self) -> Self {
        self.status = TransactionStatus::Pending;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn validate(&self) -> LedgerResult<()> {
        ensure_positive(self.amount).map_err(|_| LedgerError::InvalidAmount(self.amount))?;
        if self.status == TransactionStatus::Failed {
            return Err(LedgerError::InvalidState(
                "transactions cannot be appended as FAILED".into(),
            ));
        }
        Ok(())
    }
}

/// Fold the wallet formula over a sequence of rows.
pub fn fold_wallet<'a>(rows: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    rows.into_iter()
        .map(Transaction::wallet_delta)
        .fold(Decimal::ZERO, |acc, delta| acc + delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(kind: TransactionKind, amount: Decimal, status: TransactionStatus) -> Transaction {
        Transaction {
            id: TransactionId(1),
            account: AccountId(1),
            kind,
            amount,
            booking: None,
            consultant: None,
            status,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn wallet_formula_matches_kind_direction() {
        let rows = vec![
            row(TransactionKind::Credit, dec!(500), TransactionStatus::Success),
            row(TransactionKind::Subscription, dec!(20), TransactionStatus::Success),
            row(TransactionKind::ChatCredit, dec!(5), TransactionStatus::Success),
            row(TransactionKind::Earning, dec!(100), TransactionStatus::Success),
            row(TransactionKind::Debit, dec!(220), TransactionStatus::Success),
            row(TransactionKind::Commission, dec!(5), TransactionStatus::Success),
        ];
        assert_eq!(fold_wallet(&rows), dec!(400));
    }

    #[test]
    fn only_successful_rows_move_balances() {
        let rows = vec![
            row(TransactionKind::Credit, dec!(100), TransactionStatus::Success),
            row(TransactionKind::Credit, dec!(900), TransactionStatus::Pending),
            row(TransactionKind::Credit, dec!(50), TransactionStatus::Failed),
        ];
        assert_eq!(fold_wallet(&rows), dec!(100));
    }

    #[test]
    fn validation_rejects_non_positive_amounts() {
        let txn = NewTransaction::new(AccountId(1), TransactionKind::Credit, Decimal::ZERO);
        assert!(matches!(txn.validate(), Err(LedgerError::InvalidAmount(_))));
        let txn = NewTransaction::new(AccountId(1), TransactionKind::Credit, dec!(-3));
        assert!(txn.validate().is_err());
        let txn = NewTransaction::new(AccountId(1), TransactionKind::Credit, dec!(3)).pending();
        assert!(txn.validate().is_ok());
    }

    #[test]
    fn pending_rows_resolve_once() {
        assert!(TransactionStatus::Pending.can_resolve_to(TransactionStatus::Success));
        assert!(TransactionStatus::Pending.can_resolve_to(TransactionStatus::Failed));
        assert!(!TransactionStatus::Pending.can_resolve_to(TransactionStatus::Pending));
        assert!(!TransactionStatus::Success.can_resolve_to(TransactionStatus::Failed));
        assert!(!TransactionStatus::Failed.can_resolve_to(TransactionStatus::Success));
    }

    #[test]
    fn kind_strings_parse() {
        for kind in TransactionKind::ALL {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("REFUND".parse::<TransactionKind>().is_err());
    }
}
