use consultpay_core::CoreError;
use rust_decimal::Decimal;
use thiserror::Error;

pub type CommissionResult<T> = Result<T, CommissionError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommissionError {
    /// A percentage outside `[0, 100]` was supplied for a write.
    #[error("configuration error: {0}")]
    Configuration(#[from] CoreError),
    #[error("base price must not be negative, got {0}")]
    NegativePrice(Decimal),
    #[error("base price {0} is too large to split")]
    PriceOverflow(Decimal),
}
