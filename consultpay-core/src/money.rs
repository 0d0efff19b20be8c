use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Number of decimal places money is persisted with.
pub const MONEY_SCALE: u32 = 2;

/// Round a monetary amount to the persisted precision.
///
/// Intermediate math stays unrounded; call this only when a value is about to be stored.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject zero and negative amounts.
pub fn ensure_positive(amount: Decimal) -> CoreResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(amount));
    }
    Ok(amount)
}

/// Percentage constrained to the closed interval `[0, 100]`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);
    pub const HUNDRED: Percent = Percent(Decimal::ONE_HUNDRED);

    pub fn new(value: Decimal) -> CoreResult<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(CoreError::InvalidPercent(value));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// The percentage as a fraction, e.g. `15` becomes `0.15`.
    pub fn fraction(self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }
}

impl TryFrom<Decimal> for Percent {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Percent::new(value)
    }
}

impl From<Percent> for Decimal {
    fn from(value: Percent) -> Self {
        value.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for Percent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('%');
        let value = Decimal::from_str(trimmed).map_err(|_| CoreError::UnknownVariant {
            kind: "percentage",
            value: s.to_string(),
        })?;
        Percent::new(value)
    }
}
