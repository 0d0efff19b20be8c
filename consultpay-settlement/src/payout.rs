use std::sync::Arc;

use consultpay_core::{ConsultantId, PayoutId};
use consultpay_events::{Event, EventBus, PayoutRecordedEvent};
use consultpay_ledger::{NewPayout, Payout};
use rust_decimal::Decimal;
use tracing::info;

use crate::balance::{BalanceAggregator, IntegrityWarning};
use crate::{SettlementError, SettlementResult, Store};

/// Operator request to record an off-platform transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutRequest {
    pub consultant: ConsultantId,
    pub amount: Decimal,
    pub notes: Option<String>,
    /// Outstanding balance shown to the operator. When set, the payout is
    /// rejected if the balance moved before the write.
    pub expected_outstanding: Option<Decimal>,
}

impl PayoutRequest {
    pub fn new(consultant: ConsultantId, amount: Decimal) -> Self {
        Self {
            consultant,
            amount,
            notes: None,
            expected_outstanding: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn expecting_outstanding(mut self, outstanding: Decimal) -> Self {
        self.expected_outstanding = Some(outstanding);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub payout: Payout,
    pub new_outstanding: Decimal,
    pub warnings: Vec<IntegrityWarning>,
}

/// The only write path that changes a consultant's total paid.
#[derive(Clone)]
pub struct PayoutRecorder {
    store: Arc<dyn Store>,
    bus: EventBus,
    balances: BalanceAggregator,
}

impl PayoutRecorder {
    pub fn new(store: Arc<dyn Store>, bus: EventBus) -> Self {
        let balances = BalanceAggregator::new(store.clone(), bus.clone());
        Self {
            store,
            bus,
            balances,
        }
    }

    pub fn record_payout(
        &self,
        consultant: ConsultantId,
        amount: Decimal,
        notes: Option<String>,
    ) -> SettlementResult<PayoutReceipt> {
        self.record(PayoutRequest {
            consultant,
            amount,
            notes,
            expected_outstanding: None,
        })
    }

    /// Record a payout. Any positive amount is accepted; overpayment shows up
    /// as an integrity warning on the receipt rather than a rejection.
    pub fn record(&self, request: PayoutRequest) -> SettlementResult<PayoutReceipt> {
        if request.amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidPayoutAmount(request.amount));
        }
        let consultant = self
            .store
            .consultant(request.consultant)?
            .ok_or_else(|| SettlementError::NotFound(format!("consultant {}", request.consultant)))?;

        let commit = self.store.commit_payout(&NewPayout {
            consultant: request.consultant,
            amount: request.amount,
            notes: request.notes,
            expected_outstanding: request.expected_outstanding,
        })?;
        info!(
            consultant_id = %consultant.id,
            payout_id = %commit.payout.id,
            amount = %commit.payout.amount,
            outstanding = %commit.outstanding_after,
            "payout recorded"
        );

        let mut warnings = Vec::new();
        if commit.outstanding_after < Decimal::ZERO {
            let warning = IntegrityWarning::NegativeOutstanding {
                consultant: consultant.id,
                outstanding: commit.outstanding_after,
            };
            self.balances.surface(&warning);
            warnings.push(warning);
        }

        self.bus.publish(Event::PayoutRecorded(PayoutRecordedEvent {
            payout: commit.payout.id,
            consultant: consultant.id,
            consultant_name: consultant.name.clone(),
            consultant_email: consultant.email.clone(),
            amount: commit.payout.amount,
            outstanding_after: commit.outstanding_after,
            notes: commit.payout.notes.clone(),
            paid_at: commit.payout.paid_at.unwrap_or(commit.payout.created_at),
        }));

        Ok(PayoutReceipt {
            payout: commit.payout,
            new_outstanding: commit.outstanding_after,
            warnings,
        })
    }

    pub fn history(&self, consultant: ConsultantId) -> SettlementResult<Vec<Payout>> {
        Ok(self.store.payouts(consultant, None)?)
    }

    pub fn update_notes(&self, id: PayoutId, notes: Option<String>) -> SettlementResult<Payout> {
        Ok(self.store.update_payout_notes(id, notes)?)
    }
}
