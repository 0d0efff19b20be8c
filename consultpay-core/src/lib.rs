//! Domain types shared by every Consultpay crate.

mod booking;
mod error;
mod ids;
mod money;
mod party;

pub use booking::{Booking, BookingSnapshot, BookingStatus};
pub use error::{CoreError, CoreResult};
pub use ids::{AccountId, BookingId, ConsultantId, PayoutId, TransactionId};
pub use money::{ensure_positive, round_money, Percent, MONEY_SCALE};
pub use party::{CommissionOverrides, Consultant, GlobalSettings, User};
