use consultpay_core::{CommissionOverrides, Consultant, GlobalSettings, Percent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CommissionResult;

/// Where an effective percentage came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Override,
    PlatformDefault,
}

/// Effective percentages for one consultant after resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCommission {
    pub consultant_pct: Percent,
    pub user_pct: Percent,
    pub consultant_source: RateSource,
    pub user_source: RateSource,
}

/// Two-level commission resolution: per-consultant override, else platform default.
///
/// This is the only place the fallback rule lives; callers never inspect the
/// nullable consultant fields themselves.
#[derive(Clone, Copy, Debug)]
pub struct CommissionPolicy {
    default_consultant: Percent,
    default_user: Percent,
}

impl CommissionPolicy {
    pub fn new(default_consultant: Percent, default_user: Percent) -> Self {
        Self {
            default_consultant,
            default_user,
        }
    }

    pub fn from_settings(settings: &GlobalSettings) -> Self {
        Self::new(settings.default_consultant_comm, settings.default_user_comm)
    }

    pub fn resolve(&self, overrides: CommissionOverrides) -> ResolvedCommission {
        let (consultant_pct, consultant_source) =
            pick(overrides.consultant_pct, self.default_consultant);
        let (user_pct, user_source) = pick(overrides.user_pct, self.default_user);
        ResolvedCommission {
            consultant_pct,
            user_pct,
            consultant_source,
            user_source,
        }
    }

    pub fn resolve_for(&self, consultant: &Consultant) -> ResolvedCommission {
        self.resolve(consultant.overrides())
    }
}

fn pick(value: Option<Percent>, fallback: Percent) -> (Percent, RateSource) {
    match value {
        Some(pct) => (pct, RateSource::Override),
        None => (fallback, RateSource::PlatformDefault),
    }
}

/// Validate raw percentages for a write. `None` means "reset to platform default".
pub fn parse_overrides(
    consultant_pct: Option<Decimal>,
    user_pct: Option<Decimal>,
) -> CommissionResult<CommissionOverrides> {
    Ok(CommissionOverrides {
        consultant_pct: consultant_pct.map(Percent::new).transpose()?,
        user_pct: user_pct.map(Percent::new).transpose()?,
    })
}

/// Validate a pair of platform defaults for a write.
pub fn parse_defaults(
    consultant_pct: Decimal,
    user_pct: Decimal,
) -> CommissionResult<(Percent, Percent)> {
    Ok((Percent::new(consultant_pct)?, Percent::new(user_pct)?))
}
