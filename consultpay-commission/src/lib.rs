//! Commission resolution and price splitting.
//!
//! Both halves are pure: [`CommissionPolicy`] turns platform defaults plus a
//! consultant's overrides into effective percentages, and [`split`] applies them
//! to a base price.

mod error;
mod policy;
mod split;

pub use error::{CommissionError, CommissionResult};
pub use policy::{
    parse_defaults, parse_overrides, CommissionPolicy, RateSource, ResolvedCommission,
};
pub use split::{split, PriceSplit, SettledAmounts};
