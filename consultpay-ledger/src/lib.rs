//! Append-only money ledger and its SQLite storage backend.
//!
//! The ledger is the single source of truth for balances. Wallet rows kept by
//! the store are a cache that [`LedgerRepository::rebuild_wallet`] can always
//! recompute from the transaction history.

mod error;
mod payout;
mod query;
mod repository;
mod sqlite;
mod transaction;

pub use error::{LedgerError, LedgerResult};
pub use payout::{NewPayout, Payout, PayoutCommit, PayoutStatus};
pub use query::TransactionQuery;
pub use repository::{
    CatalogRepository, LedgerRepository, SettlementBatch, SettlementCommit, WalletCache,
};
pub use sqlite::{SqliteStore, StoreOptions};
pub use transaction::{
    fold_wallet, NewTransaction, Transaction, TransactionKind, TransactionStatus,
};
