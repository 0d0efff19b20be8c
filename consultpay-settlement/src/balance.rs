use std::fmt;
use std::sync::Arc;

use consultpay_core::{AccountId, BookingStatus, ConsultantId};
use consultpay_events::{Event, EventBus, IntegrityWarningEvent};
use consultpay_ledger::{
    fold_wallet, PayoutStatus, Transaction, TransactionKind, TransactionQuery, TransactionStatus,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{SettlementError, SettlementResult, Store};

/// Non-fatal data-integrity finding surfaced to operators. Never auto-corrected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// More has been paid out than earned.
    NegativeOutstanding {
        consultant: ConsultantId,
        outstanding: Decimal,
    },
    /// A wallet cache disagrees with its ledger replay.
    WalletDrift {
        account: AccountId,
        cached: Decimal,
        replayed: Decimal,
    },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::NegativeOutstanding {
                consultant,
                outstanding,
            } => write!(
                f,
                "consultant {consultant} has negative outstanding {outstanding} (overpaid)"
            ),
            IntegrityWarning::WalletDrift {
                account,
                cached,
                replayed,
            } => write!(
                f,
                "wallet {account} cache {cached} differs from ledger replay {replayed}"
            ),
        }
    }
}

/// Ledger-derived view of what a consultant is owed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayoutSummary {
    pub consultant: ConsultantId,
    pub total_earned: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
    pub completed_bookings: usize,
    pub total_commission: Decimal,
    pub warnings: Vec<IntegrityWarning>,
}

/// Result of comparing one cached wallet against a full replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WalletCheck {
    pub account: AccountId,
    pub replayed: Decimal,
    pub cached: Option<Decimal>,
}

impl WalletCheck {
    pub fn is_consistent(&self) -> bool {
        self.cached.unwrap_or(Decimal::ZERO) == self.replayed
    }
}

/// Outcome of a full read-only verification pass.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LedgerReport {
    pub wallets: Vec<WalletCheck>,
    pub consultants: Vec<PayoutSummary>,
    pub platform_commission: Decimal,
}

impl LedgerReport {
    pub fn warnings(&self) -> Vec<IntegrityWarning> {
        let mut warnings: Vec<IntegrityWarning> = self
            .wallets
            .iter()
            .filter(|check| !check.is_consistent())
            .map(|check| IntegrityWarning::WalletDrift {
                account: check.account,
                cached: check.cached.unwrap_or(Decimal::ZERO),
                replayed: check.replayed,
            })
            .collect();
        for summary in &self.consultants {
            warnings.extend(summary.warnings.iter().cloned());
        }
        warnings
    }

    pub fn is_clean(&self) -> bool {
        self.warnings().is_empty()
    }
}

/// Incrementally maintained wallet balance; must always equal a full fold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunningBalance {
    balance: Decimal,
}

impl RunningBalance {
    pub fn apply(&mut self, row: &Transaction) {
        self.balance += row.wallet_delta();
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }
}

/// Read path over the ledger. Everything here is derived and lock-free.
#[derive(Clone)]
pub struct BalanceAggregator {
    store: Arc<dyn Store>,
    bus: EventBus,
}

impl BalanceAggregator {
    pub fn new(store: Arc<dyn Store>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Wallet balance by full replay of the account's transactions.
    pub fn wallet_balance(&self, account: AccountId) -> SettlementResult<Decimal> {
        let rows = self.store.query(TransactionQuery::for_account(account))?;
        Ok(fold_wallet(&rows))
    }

    pub fn wallet_check(&self, account: AccountId) -> SettlementResult<WalletCheck> {
        let replayed = self.wallet_balance(account)?;
        let cached = self
            .store
            .cached_wallet(account)?
            .map(|wallet| wallet.balance);
        Ok(WalletCheck {
            account,
            replayed,
            cached,
        })
    }

    pub fn consultant_payout_summary(
        &self,
        consultant: ConsultantId,
    ) -> SettlementResult<PayoutSummary> {
        if self.store.consultant(consultant)?.is_none() {
            return Err(SettlementError::NotFound(format!("consultant {consultant}")));
        }
        let rows = self.store.query(
            TransactionQuery::for_consultant(consultant).with_status(TransactionStatus::Success),
        )?;
        let platform = self.store.platform_account();
        let total_earned = sum_kind(&rows, TransactionKind::Earning, None);
        let total_commission = sum_kind(&rows, TransactionKind::Commission, Some(platform))
            - sum_kind(&rows, TransactionKind::Debit, Some(platform));
        let total_paid = self
            .store
            .payouts(consultant, Some(PayoutStatus::Paid))?
            .iter()
            .fold(Decimal::ZERO, |acc, payout| acc + payout.amount);
        let completed_bookings = self
            .store
            .bookings_for_consultant(consultant, Some(BookingStatus::Settled))?
            .len();

        let outstanding = total_earned - total_paid;
        let mut warnings = Vec::new();
        if outstanding < Decimal::ZERO {
            let warning = IntegrityWarning::NegativeOutstanding {
                consultant,
                outstanding,
            };
            self.surface(&warning);
            warnings.push(warning);
        }
        debug!(
            consultant = %consultant,
            earned = %total_earned,
            paid = %total_paid,
            outstanding = %outstanding,
            "computed payout summary"
        );
        Ok(PayoutSummary {
            consultant,
            total_earned,
            total_paid,
            outstanding,
            completed_bookings,
            total_commission,
            warnings,
        })
    }

    /// Net platform revenue: commission rows minus subsidies.
    pub fn platform_commission_total(&self) -> SettlementResult<Decimal> {
        let platform = self.store.platform_account();
        let rows = self.store.query(
            TransactionQuery::for_account(platform).with_status(TransactionStatus::Success),
        )?;
        Ok(sum_kind(&rows, TransactionKind::Commission, None)
            - sum_kind(&rows, TransactionKind::Debit, None))
    }

    /// Compare every wallet with its ledger replay and summarise every consultant.
    ///
    /// Accounts with ledger rows but no cache row are checked too.
    pub fn verify(&self) -> SettlementResult<LedgerReport> {
        let mut report = LedgerReport {
            platform_commission: self.platform_commission_total()?,
            ..LedgerReport::default()
        };
        for account in self.store.wallet_accounts()? {
            let check = self.wallet_check(account)?;
            if !check.is_consistent() {
                warn!(
                    account = %check.account,
                    cached = ?check.cached,
                    replayed = %check.replayed,
                    "wallet cache drifted from ledger"
                );
            }
            report.wallets.push(check);
        }
        for consultant in self.store.consultants()? {
            report
                .consultants
                .push(self.consultant_payout_summary(consultant.id)?);
        }
        Ok(report)
    }

    pub(crate) fn surface(&self, warning: &IntegrityWarning) {
        warn!(warning = %warning, "ledger integrity warning");
        if let IntegrityWarning::NegativeOutstanding {
            consultant,
            outstanding,
        } = warning
        {
            self.bus
                .publish(Event::IntegrityWarning(IntegrityWarningEvent {
                    consultant: *consultant,
                    outstanding: *outstanding,
                    message: warning.to_string(),
                }));
        }
    }
}

fn sum_kind(rows: &[Transaction], kind: TransactionKind, account: Option<AccountId>) -> Decimal {
    rows.iter()
        .filter(|row| row.kind == kind && row.status == TransactionStatus::Success)
        .filter(|row| account.map_or(true, |account| row.account == account))
        .fold(Decimal::ZERO, |acc, row| acc + row.amount)
}
