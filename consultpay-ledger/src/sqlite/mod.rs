use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use consultpay_core::{
    ensure_positive, AccountId, Booking, BookingId, BookingStatus, ConsultantId, PayoutId,
    TransactionId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    fold_wallet, LedgerError, LedgerRepository, LedgerResult, NewPayout, NewTransaction, Payout,
    PayoutCommit, PayoutStatus, SettlementBatch, SettlementCommit, Transaction, TransactionKind,
    TransactionQuery, TransactionStatus, WalletCache,
};

mod catalog;
mod rows;

use rows::{
    encode_ts, optional_int, optional_text, row_to_booking, row_to_payout, row_to_transaction,
    row_to_wallet, BOOKING_COLUMNS, PAYOUT_COLUMNS, TRANSACTION_COLUMNS,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS wallets (
    account_id INTEGER PRIMARY KEY REFERENCES accounts(id),
    balance TEXT NOT NULL,
    last_transaction_id INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS global_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    default_consultant_comm TEXT NOT NULL,
    default_user_comm TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS consultants (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id),
    hourly_price TEXT NOT NULL,
    consultant_commission_pct TEXT,
    user_commission_pct TEXT
);
CREATE TABLE IF NOT EXISTS bookings (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES accounts(id),
    consultant_id INTEGER NOT NULL REFERENCES consultants(id),
    status TEXT NOT NULL,
    consultant_fee TEXT,
    amount_deducted_from_user TEXT,
    commission_fee TEXT,
    consultant_earning TEXT,
    subsidised INTEGER NOT NULL DEFAULT 0,
    settlement_error TEXT,
    created_at TEXT NOT NULL,
    settled_at TEXT
);
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    kind TEXT NOT NULL CHECK (kind IN ('CREDIT', 'DEBIT', 'EARNING', 'COMMISSION', 'SUBSCRIPTION', 'CHAT_CREDIT')),
    amount TEXT NOT NULL,
    booking_id INTEGER REFERENCES bookings(id),
    consultant_id INTEGER REFERENCES consultants(id),
    status TEXT NOT NULL CHECK (status IN ('PENDING', 'SUCCESS', 'FAILED')),
    description TEXT,
    reverses_id INTEGER REFERENCES transactions(id),
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS transactions_idx_account ON transactions(account_id, created_at, id);
CREATE INDEX IF NOT EXISTS transactions_idx_consultant ON transactions(consultant_id, kind);
CREATE UNIQUE INDEX IF NOT EXISTS transactions_settlement_once
    ON transactions(booking_id, kind, account_id)
    WHERE booking_id IS NOT NULL AND kind IN ('DEBIT', 'EARNING', 'COMMISSION');
CREATE UNIQUE INDEX IF NOT EXISTS transactions_reversed_once
    ON transactions(reverses_id)
    WHERE reverses_id IS NOT NULL;
CREATE TABLE IF NOT EXISTS payouts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    consultant_id INTEGER NOT NULL REFERENCES consultants(id),
    amount TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('PENDING', 'PAID')),
    notes TEXT,
    paid_at TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS payouts_idx_consultant ON payouts(consultant_id);
"#;

/// Tunables for [`SqliteStore`].
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Account that owns commission rows. It has no wallet.
    pub platform_account: AccountId,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            platform_account: AccountId(0),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite-backed ledger and catalog.
///
/// Each call opens its own connection, so the store is cheap to clone and safe
/// to share across threads. Multi-row writes run inside `BEGIN IMMEDIATE`
/// transactions, which serialise writers and make check-then-write atomic.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    path: PathBuf,
    options: StoreOptions,
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>, options: StoreOptions) -> LedgerResult<Self> {
        let store = Self {
            path: path.into(),
            options,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_schema(&self) -> LedgerResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO accounts (id, name, email, created_at) VALUES (?1, 'platform', NULL, ?2)",
            params![self.options.platform_account.get(), encode_ts(Utc::now())],
        )?;
        Ok(())
    }

    fn connect(&self) -> LedgerResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
        )?;
        Ok(conn)
    }

    fn insert_transaction(
        &self,
        conn: &Connection,
        row: &NewTransaction,
        now: DateTime<Utc>,
    ) -> LedgerResult<Transaction> {
        row.validate()?;
        conn.execute(
            "INSERT INTO transactions (
                account_id, kind, amount, booking_id, consultant_id, status, description, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.account.get(),
                row.kind.as_str(),
                row.amount.to_string(),
                row.booking.map(BookingId::get),
                row.consultant.map(ConsultantId::get),
                row.status.as_str(),
                row.description,
                encode_ts(now),
            ],
        )?;
        let stored = Transaction {
            id: TransactionId(conn.last_insert_rowid()),
            account: row.account,
            kind: row.kind,
            amount: row.amount,
            booking: row.booking,
            consultant: row.consultant,
            status: row.status,
            description: row.description.clone(),
            created_at: now,
        };
        self.apply_wallet_delta(conn, &stored, now)?;
        Ok(stored)
    }

    /// Fold one row into the wallet cache, creating the wallet on first use.
    fn apply_wallet_delta(
        &self,
        conn: &Connection,
        row: &Transaction,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let delta = row.wallet_delta();
        if row.account == self.options.platform_account || delta.is_zero() {
            return Ok(());
        }
        let (current, last) = match load_wallet(conn, row.account)? {
            Some(wallet) => (wallet.balance, wallet.last_transaction.max(row.id)),
            None => (Decimal::ZERO, row.id),
        };
        store_wallet(conn, row.account, current + delta, last, now)
    }

    /// Authoritative balance: full replay of the account's successful rows.
    fn replay_wallet(&self, conn: &Connection, account: AccountId) -> LedgerResult<Decimal> {
        let rows = load_transactions(conn, &TransactionQuery::for_account(account))?;
        Ok(fold_wallet(&rows))
    }
}

impl LedgerRepository for SqliteStore {
    fn platform_account(&self) -> AccountId {
        self.options.platform_account
    }

    fn append(&self, transaction: &NewTransaction) -> LedgerResult<Transaction> {
        transaction.validate()?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = self.insert_transaction(&tx, transaction, Utc::now())?;
        tx.commit()?;
        debug!(id = %stored.id, kind = %stored.kind, amount = %stored.amount, "ledger row appended");
        Ok(stored)
    }

    fn resolve_pending(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> LedgerResult<Transaction> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut row = load_transaction(&tx, id)?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        if !row.status.can_resolve_to(status) {
            return Err(LedgerError::InvalidStatusTransition {
                from: row.status,
                to: status,
            });
        }
        tx.execute(
            "UPDATE transactions SET status = ?1 WHERE id = ?2 AND status = 'PENDING'",
            params![status.as_str(), id.get()],
        )?;
        row.status = status;
        self.apply_wallet_delta(&tx, &row, Utc::now())?;
        tx.commit()?;
        Ok(row)
    }

    fn transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        let conn = self.connect()?;
        load_transaction(&conn, id)
    }

    fn reverse_transaction(&self, id: TransactionId, reason: &str) -> LedgerResult<Transaction> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let original = load_transaction(&tx, id)?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        if original.status != TransactionStatus::Success {
            return Err(LedgerError::NotReversible(format!(
                "transaction {id} is {}",
                original.status
            )));
        }
        if original.account == self.options.platform_account {
            return Err(LedgerError::NotReversible(
                "platform rows are not wallet movements".into(),
            ));
        }
        if let Some(booking) = original.booking {
            return Err(LedgerError::NotReversible(format!(
                "transaction {id} belongs to the settlement of booking {booking}"
            )));
        }
        let opposite = match original.kind {
            TransactionKind::Credit | TransactionKind::Subscription | TransactionKind::ChatCredit => {
                TransactionKind::Debit
            }
            TransactionKind::Debit => TransactionKind::Credit,
            TransactionKind::Earning | TransactionKind::Commission => {
                return Err(LedgerError::NotReversible(format!(
                    "{} rows belong to settlement",
                    original.kind
                )))
            }
        };
        let prior: Option<i64> = tx
            .query_row(
                "SELECT id FROM transactions WHERE reverses_id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(prior) = prior {
            return Err(LedgerError::NotReversible(format!(
                "transaction {id} was already reversed by #{prior}"
            )));
        }

        let mut row = NewTransaction::new(original.account, opposite, original.amount)
            .with_description(format!("reversal of #{id}: {reason}"));
        if let Some(consultant) = original.consultant {
            row = row.for_consultant(consultant);
        }
        let stored = self.insert_transaction(&tx, &row, Utc::now())?;
        tx.execute(
            "UPDATE transactions SET reverses_id = ?1 WHERE id = ?2",
            params![id.get(), stored.id.get()],
        )?;
        tx.commit()?;
        debug!(original = %id, reversal = %stored.id, "ledger row reversed");
        Ok(stored)
    }

    fn query(&self, query: TransactionQuery) -> LedgerResult<Vec<Transaction>> {
        let conn = self.connect()?;
        load_transactions(&conn, &query)
    }

    fn commit_settlement(&self, batch: &SettlementBatch) -> LedgerResult<SettlementCommit> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let booking = load_booking(&tx, batch.booking)?
            .ok_or_else(|| LedgerError::NotFound(format!("booking {}", batch.booking)))?;
        if booking.status == BookingStatus::Settled {
            return Ok(SettlementCommit::AlreadySettled { booking });
        }
        if !booking.status.is_settleable() {
            return Err(LedgerError::NotSettleable {
                booking: booking.id,
                status: booking.status,
            });
        }
        if booking.user != batch.user || booking.consultant != batch.consultant {
            return Err(LedgerError::InvalidState(format!(
                "settlement batch does not match booking {}",
                booking.id
            )));
        }

        let required = batch.snapshot.amount_deducted_from_user;
        if required > Decimal::ZERO {
            let available = self.replay_wallet(&tx, batch.user)?;
            if available < required {
                tx.execute(
                    "UPDATE bookings SET settlement_error = ?1 WHERE id = ?2",
                    params![
                        format!("insufficient funds: required {required}, available {available}"),
                        booking.id.get()
                    ],
                )?;
                tx.commit()?;
                return Err(LedgerError::InsufficientFunds {
                    required,
                    available,
                });
            }
        }

        let now = Utc::now();
        let mut written = Vec::with_capacity(3);
        for row in batch.transactions() {
            written.push(self.insert_transaction(&tx, &row, now)?);
        }
        let snapshot = &batch.snapshot;
        let updated = tx.execute(
            "UPDATE bookings SET status = 'SETTLED', consultant_fee = ?1,
                 amount_deducted_from_user = ?2, commission_fee = ?3, consultant_earning = ?4,
                 subsidised = ?5, settlement_error = NULL, settled_at = ?6
             WHERE id = ?7 AND status IN ('CONFIRMED', 'COMPLETED')",
            params![
                snapshot.consultant_fee.to_string(),
                snapshot.amount_deducted_from_user.to_string(),
                snapshot.commission_fee.to_string(),
                snapshot.consultant_earning.to_string(),
                snapshot.subsidised,
                encode_ts(now),
                booking.id.get(),
            ],
        )?;
        if updated != 1 {
            return Err(LedgerError::InvalidState(format!(
                "booking {} changed during settlement",
                booking.id
            )));
        }
        let booking = load_booking(&tx, batch.booking)?
            .ok_or_else(|| LedgerError::NotFound(format!("booking {}", batch.booking)))?;
        tx.commit()?;
        Ok(SettlementCommit::Settled {
            booking,
            transactions: written,
        })
    }

    fn commit_payout(&self, payout: &NewPayout) -> LedgerResult<PayoutCommit> {
        ensure_positive(payout.amount).map_err(|_| LedgerError::InvalidAmount(payout.amount))?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM consultants WHERE id = ?1",
                params![payout.consultant.get()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(LedgerError::NotFound(format!(
                "consultant {}",
                payout.consultant
            )));
        }

        let earned = consultant_earned(&tx, payout.consultant)?;
        let paid = consultant_paid(&tx, payout.consultant)?;
        let outstanding_before = earned - paid;
        if let Some(expected) = payout.expected_outstanding {
            if expected != outstanding_before {
                return Err(LedgerError::StaleOutstanding {
                    expected,
                    actual: outstanding_before,
                });
            }
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO payouts (consultant_id, amount, status, notes, paid_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                payout.consultant.get(),
                payout.amount.to_string(),
                PayoutStatus::Paid.as_str(),
                payout.notes,
                encode_ts(now),
            ],
        )?;
        let stored = Payout {
            id: PayoutId(tx.last_insert_rowid()),
            consultant: payout.consultant,
            amount: payout.amount,
            status: PayoutStatus::Paid,
            notes: payout.notes.clone(),
            paid_at: Some(now),
            created_at: now,
        };
        tx.commit()?;
        Ok(PayoutCommit {
            payout: stored,
            outstanding_before,
            outstanding_after: outstanding_before - payout.amount,
        })
    }

    fn payout(&self, id: PayoutId) -> LedgerResult<Option<Payout>> {
        let conn = self.connect()?;
        load_payout(&conn, id)
    }

    fn payouts(
        &self,
        consultant: ConsultantId,
        status: Option<PayoutStatus>,
    ) -> LedgerResult<Vec<Payout>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts
             WHERE consultant_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            consultant.get(),
            status.map(|s| s.as_str().to_string())
        ])?;
        let mut payouts = Vec::new();
        while let Some(row) = rows.next()? {
            payouts.push(row_to_payout(row)?);
        }
        Ok(payouts)
    }

    fn update_payout_notes(&self, id: PayoutId, notes: Option<String>) -> LedgerResult<Payout> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE payouts SET notes = ?1 WHERE id = ?2",
            params![notes, id.get()],
        )?;
        if updated == 0 {
            return Err(LedgerError::NotFound(format!("payout {id}")));
        }
        load_payout(&conn, id)?.ok_or_else(|| LedgerError::NotFound(format!("payout {id}")))
    }

    fn cached_wallet(&self, account: AccountId) -> LedgerResult<Option<WalletCache>> {
        let conn = self.connect()?;
        load_wallet(&conn, account)
    }

    fn wallets(&self) -> LedgerResult<Vec<WalletCache>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT account_id, balance, last_transaction_id, updated_at FROM wallets ORDER BY account_id",
        )?;
        let mut rows = stmt.query([])?;
        let mut wallets = Vec::new();
        while let Some(row) = rows.next()? {
            wallets.push(row_to_wallet(row)?);
        }
        Ok(wallets)
    }

    fn wallet_accounts(&self) -> LedgerResult<Vec<AccountId>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT account_id FROM transactions WHERE account_id != ?1
             UNION
             SELECT account_id FROM wallets WHERE account_id != ?1
             ORDER BY account_id",
        )?;
        let mut rows = stmt.query(params![self.options.platform_account.get()])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(AccountId(row.get(0)?));
        }
        Ok(accounts)
    }

    fn rebuild_wallet(&self, account: AccountId) -> LedgerResult<WalletCache> {
        if account == self.options.platform_account {
            return Err(LedgerError::InvalidState(
                "the platform account has no wallet".into(),
            ));
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rows = load_transactions(&tx, &TransactionQuery::for_account(account))?;
        let balance = fold_wallet(&rows);
        let last = rows
            .iter()
            .map(|row| row.id)
            .max()
            .unwrap_or(TransactionId(0));
        let now = Utc::now();
        store_wallet(&tx, account, balance, last, now)?;
        tx.commit()?;
        Ok(WalletCache {
            account,
            balance,
            last_transaction: last,
            updated_at: now,
        })
    }
}

fn load_transaction(conn: &Connection, id: TransactionId) -> LedgerResult<Option<Transaction>> {
    let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_transaction(row)?)),
        None => Ok(None),
    }
}

fn load_transactions(conn: &Connection, query: &TransactionQuery) -> LedgerResult<Vec<Transaction>> {
    let mut sql = format!(
        "SELECT {TRANSACTION_COLUMNS}
         FROM transactions
         WHERE (?1 IS NULL OR account_id = ?1)
           AND (?2 IS NULL OR consultant_id = ?2)
           AND (?3 IS NULL OR booking_id = ?3)
           AND (?4 IS NULL OR kind = ?4)
           AND (?5 IS NULL OR status = ?5)
           AND (?6 IS NULL OR created_at >= ?6)
           AND (?7 IS NULL OR created_at <= ?7)"
    );
    sql.push_str(if query.descending {
        " ORDER BY created_at DESC, id DESC"
    } else {
        " ORDER BY created_at ASC, id ASC"
    });
    if query.limit.is_some() {
        sql.push_str(" LIMIT ?8");
    }

    let mut params: Vec<Value> = Vec::with_capacity(8);
    params.push(optional_int(query.account.map(AccountId::get)));
    params.push(optional_int(query.consultant.map(ConsultantId::get)));
    params.push(optional_int(query.booking.map(BookingId::get)));
    params.push(optional_text(query.kind.map(|k| k.as_str().to_string())));
    params.push(optional_text(query.status.map(|s| s.as_str().to_string())));
    params.push(optional_text(query.start_time.map(encode_ts)));
    params.push(optional_text(query.end_time.map(encode_ts)));
    if let Some(limit) = query.limit {
        params.push(Value::Integer(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(row_to_transaction(row)?);
    }
    Ok(entries)
}

fn load_payout(conn: &Connection, id: PayoutId) -> LedgerResult<Option<Payout>> {
    let sql = format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_payout(row)?)),
        None => Ok(None),
    }
}

fn load_booking(conn: &Connection, id: BookingId) -> LedgerResult<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_booking(row)?)),
        None => Ok(None),
    }
}

fn load_wallet(conn: &Connection, account: AccountId) -> LedgerResult<Option<WalletCache>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, balance, last_transaction_id, updated_at FROM wallets WHERE account_id = ?1",
    )?;
    let mut rows = stmt.query(params![account.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_wallet(row)?)),
        None => Ok(None),
    }
}

fn store_wallet(
    conn: &Connection,
    account: AccountId,
    balance: Decimal,
    last: TransactionId,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO wallets (account_id, balance, last_transaction_id, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(account_id) DO UPDATE SET
             balance = excluded.balance,
             last_transaction_id = excluded.last_transaction_id,
             updated_at = excluded.updated_at",
        params![account.get(), balance.to_string(), last.get(), encode_ts(now)],
    )?;
    Ok(())
}

fn sum_amounts(conn: &Connection, sql: &str, consultant: ConsultantId) -> LedgerResult<Decimal> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![consultant.get()])?;
    let mut total = Decimal::ZERO;
    while let Some(row) = rows.next()? {
        let raw: String = row.get(0)?;
        total += raw.parse::<Decimal>().map_err(|err| {
            LedgerError::Serialization(format!("invalid decimal {raw}: {err}"))
        })?;
    }
    Ok(total)
}

fn consultant_earned(conn: &Connection, consultant: ConsultantId) -> LedgerResult<Decimal> {
    sum_amounts(
        conn,
        "SELECT amount FROM transactions
         WHERE consultant_id = ?1 AND kind = 'EARNING' AND status = 'SUCCESS'",
        consultant,
    )
}

fn consultant_paid(conn: &Connection, consultant: ConsultantId) -> LedgerResult<Decimal> {
    sum_amounts(
        conn,
        "SELECT amount FROM payouts WHERE consultant_id = ?1 AND status = 'PAID'",
        consultant,
    )
}
