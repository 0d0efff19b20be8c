use std::sync::Arc;

use consultpay_core::{AccountId, TransactionId, User};
use consultpay_ledger::{
    NewTransaction, Transaction, TransactionKind, TransactionQuery, TransactionStatus, WalletCache,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{SettlementError, SettlementResult, Store};

/// Wallet-side ledger writes: top-ups, gateway callbacks, credits and reversals.
#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn Store>,
}

impl WalletService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn register_user(&self, name: &str, email: Option<&str>) -> SettlementResult<User> {
        let user = self.store.create_account(name, email)?;
        info!(account = %user.id, "user registered");
        Ok(user)
    }

    /// Credit a wallet. `pending` rows wait for a gateway callback before they count.
    pub fn top_up(
        &self,
        account: AccountId,
        amount: Decimal,
        pending: bool,
    ) -> SettlementResult<Transaction> {
        self.ensure_wallet_account(account)?;
        let mut row = NewTransaction::new(account, TransactionKind::Credit, amount)
            .with_description("wallet top-up");
        if pending {
            row = row.pending();
        }
        let stored = self.store.append(&row)?;
        info!(account = %account, amount = %amount, status = %stored.status, "wallet top-up recorded");
        Ok(stored)
    }

    /// Apply a payment gateway callback to a pending row.
    pub fn resolve_pending(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> SettlementResult<Transaction> {
        let resolved = self.store.resolve_pending(id, status)?;
        info!(transaction_id = %id, status = %status, "pending transaction resolved");
        Ok(resolved)
    }

    /// Record a subscription or chat credit.
    pub fn credit(
        &self,
        account: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        description: Option<String>,
    ) -> SettlementResult<Transaction> {
        match kind {
            TransactionKind::Subscription | TransactionKind::ChatCredit => {}
            TransactionKind::Credit => return self.top_up(account, amount, false),
            TransactionKind::Debit | TransactionKind::Earning | TransactionKind::Commission => {
                return Err(SettlementError::InvalidRequest(format!(
                    "{kind} rows are not wallet credits"
                )))
            }
        }
        self.ensure_wallet_account(account)?;
        let mut row = NewTransaction::new(account, kind, amount);
        if let Some(description) = description {
            row = row.with_description(description);
        }
        Ok(self.store.append(&row)?)
    }

    /// Offset a wallet movement with a new row in the opposite direction.
    pub fn reverse(&self, id: TransactionId, reason: &str) -> SettlementResult<Transaction> {
        let stored = self.store.reverse_transaction(id, reason)?;
        if let Some(wallet) = self.store.cached_wallet(stored.account)? {
            if wallet.balance < Decimal::ZERO {
                warn!(
                    account = %stored.account,
                    balance = %wallet.balance,
                    "reversal left wallet negative"
                );
            }
        }
        info!(original = %id, reversal = %stored.id, "transaction reversed");
        Ok(stored)
    }

    pub fn history(&self, query: TransactionQuery) -> SettlementResult<Vec<Transaction>> {
        Ok(self.store.query(query)?)
    }

    /// Recompute every wallet cache from the ledger.
    pub fn rebuild_caches(&self) -> SettlementResult<Vec<WalletCache>> {
        let mut rebuilt = Vec::new();
        for account in self.store.wallet_accounts()? {
            rebuilt.push(self.store.rebuild_wallet(account)?);
        }
        Ok(rebuilt)
    }

    fn ensure_wallet_account(&self, account: AccountId) -> SettlementResult<()> {
        if account == self.store.platform_account() {
            return Err(SettlementError::InvalidRequest(
                "the platform account has no wallet".into(),
            ));
        }
        if self.store.account(account)?.is_none() {
            return Err(SettlementError::NotFound(format!("account {account}")));
        }
        Ok(())
    }
}
