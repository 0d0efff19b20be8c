use consultpay_commission::CommissionError;
use consultpay_core::{BookingId, BookingStatus};
use consultpay_ledger::LedgerError;
use rust_decimal::Decimal;
use thiserror::Error;

pub type SettlementResult<T> = Result<T, SettlementError>;

/// Failures returned by the settlement and payout write paths.
///
/// None of these leave a partially written ledger behind.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Configuration(#[from] CommissionError),
    #[error("platform commission defaults have not been configured")]
    MissingDefaults,
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    #[error("payout amount must be positive, got {0}")]
    InvalidPayoutAmount(Decimal),
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("booking {booking} cannot be settled from status {status}")]
    BookingNotSettleable {
        booking: BookingId,
        status: BookingStatus,
    },
    #[error("outstanding changed since it was read: expected {expected}, found {actual}")]
    StaleOutstanding { expected: Decimal, actual: Decimal },
    #[error("{0} not found")]
    NotFound(String),
    #[error("transaction cannot be reversed: {0}")]
    NotReversible(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<LedgerError> for SettlementError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
            LedgerError::NotSettleable { booking, status } => {
                Self::BookingNotSettleable { booking, status }
            }
            LedgerError::StaleOutstanding { expected, actual } => {
                Self::StaleOutstanding { expected, actual }
            }
            LedgerError::InvalidAmount(amount) => Self::InvalidAmount(amount),
            LedgerError::NotFound(what) => Self::NotFound(what),
            LedgerError::NotReversible(reason) => Self::NotReversible(reason),
            other => Self::Ledger(other),
        }
    }
}
