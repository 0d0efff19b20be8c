use chrono::{DateTime, Utc};
use consultpay_core::{
    AccountId, Booking, BookingId, BookingSnapshot, BookingStatus, CommissionOverrides,
    Consultant, ConsultantId, GlobalSettings, PayoutId, Percent, TransactionId, User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    LedgerResult, NewPayout, NewTransaction, Payout, PayoutCommit, PayoutStatus, Transaction,
    TransactionKind, TransactionQuery, TransactionStatus,
};

/// Cached wallet projection. Always recomputable from the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCache {
    pub account: AccountId,
    pub balance: Decimal,
    /// Highest transaction folded into `balance`.
    pub last_transaction: TransactionId,
    pub updated_at: DateTime<Utc>,
}

/// Everything the store needs to settle one booking in a single unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementBatch {
    pub booking: BookingId,
    pub user: AccountId,
    pub consultant: ConsultantId,
    pub consultant_account: AccountId,
    pub platform_account: AccountId,
    pub snapshot: BookingSnapshot,
}

impl SettlementBatch {
    /// Ledger rows implied by the snapshot. Zero legs are omitted.
    pub fn transactions(&self) -> Vec<NewTransaction> {
        let snapshot = &self.snapshot;
        let mut rows = Vec::with_capacity(3);
        if snapshot.amount_deducted_from_user > Decimal::ZERO {
            rows.push(
                NewTransaction::new(
                    self.user,
                    TransactionKind::Debit,
                    snapshot.amount_deducted_from_user,
                )
                .for_booking(self.booking)
                .for_consultant(self.consultant)
                .with_description(format!("session payment for booking #{}", self.booking)),
            );
        }
        if snapshot.consultant_earning > Decimal::ZERO {
            rows.push(
                NewTransaction::new(
                    self.consultant_account,
                    TransactionKind::Earning,
                    snapshot.consultant_earning,
                )
                .for_booking(self.booking)
                .for_consultant(self.consultant)
                .with_description(format!("earning for booking #{}", self.booking)),
            );
        }
        if snapshot.commission_fee > Decimal::ZERO {
            rows.push(
                NewTransaction::new(
                    self.platform_account,
                    TransactionKind::Commission,
                    snapshot.commission_fee,
                )
                .for_booking(self.booking)
                .for_consultant(self.consultant)
                .with_description(format!("commission for booking #{}", self.booking)),
            );
        } else if snapshot.commission_fee < Decimal::ZERO {
            rows.push(
                NewTransaction::new(
                    self.platform_account,
                    TransactionKind::Debit,
                    -snapshot.commission_fee,
                )
                .for_booking(self.booking)
                .for_consultant(self.consultant)
                .with_description(format!("platform subsidy for booking #{}", self.booking)),
            );
        }
        rows
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementCommit {
    Settled {
        booking: Booking,
        transactions: Vec<Transaction>,
    },
    /// The booking was settled by an earlier call; nothing was written.
    AlreadySettled { booking: Booking },
}

/// Abstraction over durable storage of money movements.
///
/// Every method that writes more than one row does so atomically.
pub trait LedgerRepository: Send + Sync {
    /// Account that owns commission rows. It is not a wallet.
    fn platform_account(&self) -> AccountId;

    /// Validate and persist a single transaction.
    fn append(&self, transaction: &NewTransaction) -> LedgerResult<Transaction>;

    /// Resolve a `PENDING` row to `SUCCESS` or `FAILED`.
    fn resolve_pending(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> LedgerResult<Transaction>;

    fn transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>>;

    /// Append the row offsetting a successful wallet movement.
    ///
    /// The checks and the write form one unit of work, so a row is reversed at
    /// most once. Settlement legs and platform rows are refused.
    fn reverse_transaction(&self, id: TransactionId, reason: &str) -> LedgerResult<Transaction>;

    /// Rows matching the query, ordered by `(created_at, id)`.
    fn query(&self, query: TransactionQuery) -> LedgerResult<Vec<Transaction>>;

    /// Write every leg of a settlement and freeze the booking snapshot, or nothing.
    fn commit_settlement(&self, batch: &SettlementBatch) -> LedgerResult<SettlementCommit>;

    /// Insert a paid payout after checking the optimistic outstanding token.
    fn commit_payout(&self, payout: &NewPayout) -> LedgerResult<PayoutCommit>;

    fn payout(&self, id: PayoutId) -> LedgerResult<Option<Payout>>;

    fn payouts(
        &self,
        consultant: ConsultantId,
        status: Option<PayoutStatus>,
    ) -> LedgerResult<Vec<Payout>>;

    fn update_payout_notes(&self, id: PayoutId, notes: Option<String>) -> LedgerResult<Payout>;

    fn cached_wallet(&self, account: AccountId) -> LedgerResult<Option<WalletCache>>;

    fn wallets(&self) -> LedgerResult<Vec<WalletCache>>;

    /// Every non-platform account that has ledger rows or a wallet cache.
    fn wallet_accounts(&self) -> LedgerResult<Vec<AccountId>>;

    /// Recompute one wallet cache from a full ledger replay.
    fn rebuild_wallet(&self, account: AccountId) -> LedgerResult<WalletCache>;
}

/// Storage for accounts, consultants, bookings and the commission configuration.
pub trait CatalogRepository: Send + Sync {
    fn create_account(&self, name: &str, email: Option<&str>) -> LedgerResult<User>;

    /// Insert an account with a fixed id if it does not exist yet.
    fn ensure_account(&self, id: AccountId, name: &str) -> LedgerResult<User>;

    fn account(&self, id: AccountId) -> LedgerResult<Option<User>>;

    fn create_consultant(
        &self,
        name: &str,
        email: Option<&str>,
        hourly_price: Decimal,
        overrides: CommissionOverrides,
    ) -> LedgerResult<Consultant>;

    fn consultant(&self, id: ConsultantId) -> LedgerResult<Option<Consultant>>;

    fn consultants(&self) -> LedgerResult<Vec<Consultant>>;

    /// Replace both overrides; `None` resets a field to the platform default.
    fn set_commission(
        &self,
        id: ConsultantId,
        overrides: CommissionOverrides,
    ) -> LedgerResult<Consultant>;

    fn set_hourly_price(&self, id: ConsultantId, price: Decimal) -> LedgerResult<Consultant>;

    fn global_settings(&self) -> LedgerResult<Option<GlobalSettings>>;

    fn set_global_settings(
        &self,
        consultant_pct: Percent,
        user_pct: Percent,
    ) -> LedgerResult<GlobalSettings>;

    fn create_booking(&self, user: AccountId, consultant: ConsultantId) -> LedgerResult<Booking>;

    fn booking(&self, id: BookingId) -> LedgerResult<Option<Booking>>;

    fn bookings_for_consultant(
        &self,
        consultant: ConsultantId,
        status: Option<BookingStatus>,
    ) -> LedgerResult<Vec<Booking>>;

    /// Move a booking along its lifecycle. Settlement goes through
    /// [`LedgerRepository::commit_settlement`] instead.
    fn transition_booking(&self, id: BookingId, next: BookingStatus) -> LedgerResult<Booking>;
}
