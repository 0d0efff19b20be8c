use rust_decimal::Decimal;
use thiserror::Error;

use crate::BookingStatus;

/// Result alias for domain validation.
pub type CoreResult<T> = Result<T, CoreError>;

/// Validation failures raised while constructing domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("percentage {0} is outside the range [0, 100]")]
    InvalidPercent(Decimal),
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("booking cannot move from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
