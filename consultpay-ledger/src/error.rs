use consultpay_core::{BookingId, BookingStatus, CoreError};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::TransactionStatus;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid ledger state: {0}")]
    InvalidState(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    #[error("booking {booking} cannot be settled from status {status}")]
    NotSettleable {
        booking: BookingId,
        status: BookingStatus,
    },
    #[error("outstanding changed since it was read: expected {expected}, found {actual}")]
    StaleOutstanding { expected: Decimal, actual: Decimal },
    #[error("transaction cannot be reversed: {0}")]
    NotReversible(String),
    #[error("transaction status cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}
