use std::sync::Arc;

use consultpay_commission::{split, CommissionPolicy, ResolvedCommission, SettledAmounts};
use consultpay_core::{Booking, BookingId, BookingSnapshot, BookingStatus};
use consultpay_events::{
    BookingSettledEvent, CommissionSubsidisedEvent, Event, EventBus, SettlementFailedEvent,
};
use consultpay_ledger::{SettlementBatch, SettlementCommit, Transaction};
use tracing::{debug, info, warn};

use crate::{SettlementError, SettlementResult, Store};

/// Result of a `booking_completed` trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled {
        booking: Booking,
        transactions: Vec<Transaction>,
        commission: ResolvedCommission,
    },
    /// The booking had already been settled; the trigger was a duplicate.
    AlreadySettled { booking: Booking },
}

impl SettlementOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            SettlementOutcome::Settled { booking, .. } => booking,
            SettlementOutcome::AlreadySettled { booking } => booking,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SettlementOutcome::AlreadySettled { .. })
    }
}

/// Converts completed bookings into ledger transactions exactly once.
#[derive(Clone)]
pub struct SettlementEngine {
    store: Arc<dyn Store>,
    bus: EventBus,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn Store>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Settle a booking whose call has finished.
    ///
    /// Safe to call any number of times: duplicates return
    /// [`SettlementOutcome::AlreadySettled`] without writing anything.
    pub fn booking_completed(&self, id: BookingId) -> SettlementResult<SettlementOutcome> {
        let booking = self
            .store
            .booking(id)?
            .ok_or_else(|| SettlementError::NotFound(format!("booking {id}")))?;
        if booking.status == BookingStatus::Settled {
            debug!(booking_id = %id, "duplicate settlement trigger ignored");
            return Ok(SettlementOutcome::AlreadySettled { booking });
        }
        if !booking.status.is_settleable() {
            return Err(SettlementError::BookingNotSettleable {
                booking: id,
                status: booking.status,
            });
        }

        let consultant = self
            .store
            .consultant(booking.consultant)?
            .ok_or_else(|| SettlementError::NotFound(format!("consultant {}", booking.consultant)))?;
        let settings = self
            .store
            .global_settings()?
            .ok_or(SettlementError::MissingDefaults)?;
        let commission = CommissionPolicy::from_settings(&settings).resolve_for(&consultant);
        let amounts = split(consultant.hourly_price, &commission)?.rounded();
        if amounts.is_subsidised() {
            warn!(
                booking_id = %id,
                consultant_id = %consultant.id,
                commission = %amounts.platform_commission,
                "negative platform commission; session is subsidised"
            );
        }

        let batch = SettlementBatch {
            booking: id,
            user: booking.user,
            consultant: consultant.id,
            consultant_account: consultant.account,
            platform_account: self.store.platform_account(),
            snapshot: snapshot(&amounts),
        };
        match self.store.commit_settlement(&batch) {
            Ok(SettlementCommit::Settled {
                booking,
                transactions,
            }) => {
                info!(
                    booking_id = %id,
                    user_pays = %amounts.amount_user_pays,
                    earning = %amounts.consultant_earning,
                    commission = %amounts.platform_commission,
                    rows = transactions.len(),
                    "booking settled"
                );
                self.publish_settled(&booking, &amounts);
                Ok(SettlementOutcome::Settled {
                    booking,
                    transactions,
                    commission,
                })
            }
            Ok(SettlementCommit::AlreadySettled { booking }) => {
                debug!(booking_id = %id, "booking settled concurrently; nothing written");
                Ok(SettlementOutcome::AlreadySettled { booking })
            }
            Err(err) => {
                let err = SettlementError::from(err);
                warn!(booking_id = %id, error = %err, "settlement failed");
                self.bus
                    .publish(Event::SettlementFailed(SettlementFailedEvent {
                        booking: id,
                        reason: err.to_string(),
                    }));
                Err(err)
            }
        }
    }

    fn publish_settled(&self, booking: &Booking, amounts: &SettledAmounts) {
        if amounts.is_subsidised() {
            self.bus
                .publish(Event::CommissionSubsidised(CommissionSubsidisedEvent {
                    booking: booking.id,
                    consultant: booking.consultant,
                    platform_commission: amounts.platform_commission,
                }));
        }
        self.bus.publish(Event::BookingSettled(BookingSettledEvent {
            booking: booking.id,
            user: booking.user,
            consultant: booking.consultant,
            amount_user_pays: amounts.amount_user_pays,
            consultant_earning: amounts.consultant_earning,
            platform_commission: amounts.platform_commission,
        }));
    }
}

fn snapshot(amounts: &SettledAmounts) -> BookingSnapshot {
    BookingSnapshot {
        consultant_fee: amounts.consultant_fee,
        amount_deducted_from_user: amounts.amount_user_pays,
        commission_fee: amounts.platform_commission,
        consultant_earning: amounts.consultant_earning,
        subsidised: amounts.is_subsidised(),
    }
}
