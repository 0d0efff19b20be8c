use chrono::{DateTime, Utc};
use consultpay_core::{AccountId, BookingId, ConsultantId};

use crate::{TransactionKind, TransactionStatus};

/// Filter describing which ledger rows to load from storage.
#[derive(Clone, Debug, Default)]
pub struct TransactionQuery {
    pub account: Option<AccountId>,
    pub consultant: Option<ConsultantId>,
    pub booking: Option<BookingId>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub descending: bool,
}

impl TransactionQuery {
    pub fn for_account(account: AccountId) -> Self {
        Self {
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn for_consultant(consultant: ConsultantId) -> Self {
        Self {
            consultant: Some(consultant),
            ..Self::default()
        }
    }

    pub fn for_booking(booking: BookingId) -> Self {
        Self {
            booking: Some(booking),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}
