use std::sync::Arc;

use consultpay_core::{AccountId, Booking, BookingId, BookingStatus, ConsultantId};
use tracing::info;

use crate::{SettlementResult, Store};

/// Booking lifecycle moves that happen before settlement.
#[derive(Clone)]
pub struct BookingLifecycle {
    store: Arc<dyn Store>,
}

impl BookingLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn create(&self, user: AccountId, consultant: ConsultantId) -> SettlementResult<Booking> {
        let booking = self.store.create_booking(user, consultant)?;
        info!(booking_id = %booking.id, user = %user, consultant_id = %consultant, "booking created");
        Ok(booking)
    }

    pub fn confirm(&self, id: BookingId) -> SettlementResult<Booking> {
        self.transition(id, BookingStatus::Confirmed)
    }

    /// Mark the call finished without settling it yet.
    pub fn mark_completed(&self, id: BookingId) -> SettlementResult<Booking> {
        self.transition(id, BookingStatus::Completed)
    }

    pub fn cancel(&self, id: BookingId) -> SettlementResult<Booking> {
        self.transition(id, BookingStatus::Cancelled)
    }

    pub fn reject(&self, id: BookingId) -> SettlementResult<Booking> {
        self.transition(id, BookingStatus::Rejected)
    }

    pub fn get(&self, id: BookingId) -> SettlementResult<Option<Booking>> {
        Ok(self.store.booking(id)?)
    }

    fn transition(&self, id: BookingId, next: BookingStatus) -> SettlementResult<Booking> {
        let booking = self.store.transition_booking(id, next)?;
        info!(booking_id = %id, status = %booking.status, "booking status changed");
        Ok(booking)
    }
}
