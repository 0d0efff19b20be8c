//! Settlement, balance aggregation and payout recording.
//!
//! Write paths ([`SettlementEngine`], [`PayoutRecorder`], [`WalletService`])
//! go through the storage layer's atomic units of work. The read path
//! ([`BalanceAggregator`]) only folds the append-only ledger.

mod admin;
mod balance;
mod bookings;
mod engine;
mod error;
mod notify;
mod payout;
mod store;
mod wallet;

pub use admin::CommissionAdmin;
pub use balance::{
    BalanceAggregator, IntegrityWarning, LedgerReport, PayoutSummary, RunningBalance, WalletCheck,
};
pub use bookings::BookingLifecycle;
pub use engine::{SettlementEngine, SettlementOutcome};
pub use error::{SettlementError, SettlementResult};
pub use notify::{
    DispatchStats, LogNotifier, NotificationDispatcher, Notifier, NotifyError, WebhookNotifier,
};
pub use payout::{PayoutReceipt, PayoutRecorder, PayoutRequest};
pub use store::Store;
pub use wallet::WalletService;

#[cfg(test)]
mod tests;
