use consultpay_core::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CommissionError, CommissionResult, ResolvedCommission};

/// Unrounded outcome of splitting a session price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSplit {
    pub base_price: Decimal,
    pub amount_user_pays: Decimal,
    pub consultant_earning: Decimal,
    pub platform_commission: Decimal,
}

/// Split rounded to persisted precision.
///
/// `platform_commission` is derived from the two rounded legs so the stored
/// rows always satisfy `earning + commission == user pays` exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledAmounts {
    pub consultant_fee: Decimal,
    pub amount_user_pays: Decimal,
    pub consultant_earning: Decimal,
    pub platform_commission: Decimal,
}

impl SettledAmounts {
    /// Negative commission means the platform subsidises the session.
    pub fn is_subsidised(&self) -> bool {
        self.platform_commission < Decimal::ZERO
    }
}

impl PriceSplit {
    pub fn is_subsidised(&self) -> bool {
        self.platform_commission < Decimal::ZERO
    }

    pub fn rounded(&self) -> SettledAmounts {
        let amount_user_pays = round_money(self.amount_user_pays);
        let consultant_earning = round_money(self.consultant_earning);
        SettledAmounts {
            consultant_fee: round_money(self.base_price),
            amount_user_pays,
            consultant_earning,
            platform_commission: amount_user_pays - consultant_earning,
        }
    }
}

/// Split a base price into what the user pays, what the consultant earns, and the
/// platform's commission in between.
pub fn split(base_price: Decimal, policy: &ResolvedCommission) -> CommissionResult<PriceSplit> {
    if base_price < Decimal::ZERO {
        return Err(CommissionError::NegativePrice(base_price));
    }
    let amount_user_pays = base_price
        .checked_mul(Decimal::ONE + policy.user_pct.fraction())
        .ok_or(CommissionError::PriceOverflow(base_price))?;
    let consultant_earning = base_price
        .checked_mul(Decimal::ONE - policy.consultant_pct.fraction())
        .ok_or(CommissionError::PriceOverflow(base_price))?;
    Ok(PriceSplit {
        base_price,
        amount_user_pays,
        consultant_earning,
        platform_commission: amount_user_pays - consultant_earning,
    })
}
