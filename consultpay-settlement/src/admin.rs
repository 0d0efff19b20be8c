use std::sync::Arc;

use consultpay_commission::{
    parse_defaults, parse_overrides, split, CommissionPolicy, ResolvedCommission, SettledAmounts,
};
use consultpay_core::{Consultant, ConsultantId, GlobalSettings};
use rust_decimal::Decimal;
use tracing::info;

use crate::{SettlementError, SettlementResult, Store};

/// Writes to the commission configuration. Validation happens here, on write.
#[derive(Clone)]
pub struct CommissionAdmin {
    store: Arc<dyn Store>,
}

impl CommissionAdmin {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Register a consultant with optional per-consultant overrides.
    pub fn register_consultant(
        &self,
        name: &str,
        email: Option<&str>,
        hourly_price: Decimal,
        consultant_pct: Option<Decimal>,
        user_pct: Option<Decimal>,
    ) -> SettlementResult<Consultant> {
        let overrides = parse_overrides(consultant_pct, user_pct)?;
        let consultant = self
            .store
            .create_consultant(name, email, hourly_price, overrides)?;
        info!(
            consultant_id = %consultant.id,
            account = %consultant.account,
            hourly_price = %consultant.hourly_price,
            "consultant registered"
        );
        Ok(consultant)
    }

    pub fn set_hourly_price(
        &self,
        consultant: ConsultantId,
        price: Decimal,
    ) -> SettlementResult<Consultant> {
        let updated = self.store.set_hourly_price(consultant, price)?;
        info!(consultant_id = %consultant, hourly_price = %price, "consultant price updated");
        Ok(updated)
    }

    pub fn consultants(&self) -> SettlementResult<Vec<Consultant>> {
        Ok(self.store.consultants()?)
    }

    /// Set or clear a consultant's overrides. `None` resets to the platform default.
    pub fn set_commission(
        &self,
        consultant: ConsultantId,
        consultant_pct: Option<Decimal>,
        user_pct: Option<Decimal>,
    ) -> SettlementResult<Consultant> {
        let overrides = parse_overrides(consultant_pct, user_pct)?;
        let updated = self.store.set_commission(consultant, overrides)?;
        info!(
            consultant_id = %consultant,
            consultant_pct = ?overrides.consultant_pct.map(|p| p.value()),
            user_pct = ?overrides.user_pct.map(|p| p.value()),
            "consultant commission updated"
        );
        Ok(updated)
    }

    pub fn set_global_defaults(
        &self,
        consultant_pct: Decimal,
        user_pct: Decimal,
    ) -> SettlementResult<GlobalSettings> {
        let (consultant_pct, user_pct) = parse_defaults(consultant_pct, user_pct)?;
        let settings = self.store.set_global_settings(consultant_pct, user_pct)?;
        info!(
            consultant_pct = %consultant_pct,
            user_pct = %user_pct,
            "platform commission defaults updated"
        );
        Ok(settings)
    }

    /// Write defaults only when none exist yet. Returns the effective settings.
    pub fn seed_global_defaults(
        &self,
        consultant_pct: Decimal,
        user_pct: Decimal,
    ) -> SettlementResult<GlobalSettings> {
        match self.store.global_settings()? {
            Some(existing) => Ok(existing),
            None => self.set_global_defaults(consultant_pct, user_pct),
        }
    }

    pub fn global_defaults(&self) -> SettlementResult<GlobalSettings> {
        self.store
            .global_settings()?
            .ok_or(SettlementError::MissingDefaults)
    }

    pub fn effective_commission(
        &self,
        consultant: ConsultantId,
    ) -> SettlementResult<ResolvedCommission> {
        let consultant = self.load(consultant)?;
        let settings = self.global_defaults()?;
        Ok(CommissionPolicy::from_settings(&settings).resolve_for(&consultant))
    }

    /// Preview what a session with this consultant would settle to right now.
    pub fn quote(&self, consultant: ConsultantId) -> SettlementResult<SettledAmounts> {
        let resolved = self.effective_commission(consultant)?;
        let consultant = self.load(consultant)?;
        Ok(split(consultant.hourly_price, &resolved)?.rounded())
    }

    fn load(&self, id: ConsultantId) -> SettlementResult<Consultant> {
        self.store
            .consultant(id)?
            .ok_or_else(|| SettlementError::NotFound(format!("consultant {id}")))
    }
}
