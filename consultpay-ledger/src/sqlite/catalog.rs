use chrono::Utc;
use consultpay_core::{
    ensure_positive, AccountId, Booking, BookingId, BookingStatus, CommissionOverrides,
    Consultant, ConsultantId, GlobalSettings, Percent, User,
};
use rusqlite::{params, Connection, TransactionBehavior};
use rust_decimal::Decimal;

use super::rows::{
    encode_ts, optional_percent, row_to_booking, row_to_consultant, row_to_settings,
    row_to_user, BOOKING_COLUMNS, CONSULTANT_COLUMNS,
};
use super::{load_booking, SqliteStore};
use crate::{CatalogRepository, LedgerError, LedgerResult};

impl CatalogRepository for SqliteStore {
    fn create_account(&self, name: &str, email: Option<&str>) -> LedgerResult<User> {
        let conn = self.connect()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO accounts (name, email, created_at) VALUES (?1, ?2, ?3)",
            params![name, email, encode_ts(now)],
        )?;
        Ok(User {
            id: AccountId(conn.last_insert_rowid()),
            name: name.to_string(),
            email: email.map(str::to_string),
            created_at: now,
        })
    }

    fn ensure_account(&self, id: AccountId, name: &str) -> LedgerResult<User> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO accounts (id, name, email, created_at) VALUES (?1, ?2, NULL, ?3)",
            params![id.get(), name, encode_ts(Utc::now())],
        )?;
        load_account(&conn, id)?.ok_or_else(|| LedgerError::NotFound(format!("account {id}")))
    }

    fn account(&self, id: AccountId) -> LedgerResult<Option<User>> {
        let conn = self.connect()?;
        load_account(&conn, id)
    }

    fn create_consultant(
        &self,
        name: &str,
        email: Option<&str>,
        hourly_price: Decimal,
        overrides: CommissionOverrides,
    ) -> LedgerResult<Consultant> {
        ensure_positive(hourly_price).map_err(|_| LedgerError::InvalidAmount(hourly_price))?;
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO accounts (name, email, created_at) VALUES (?1, ?2, ?3)",
            params![name, email, encode_ts(Utc::now())],
        )?;
        let account = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO consultants (
                account_id, hourly_price, consultant_commission_pct, user_commission_pct
             ) VALUES (?1, ?2, ?3, ?4)",
            params![
                account,
                hourly_price.to_string(),
                optional_percent(overrides.consultant_pct),
                optional_percent(overrides.user_pct),
            ],
        )?;
        let id = ConsultantId(tx.last_insert_rowid());
        let consultant = load_consultant(&tx, id)?
            .ok_or_else(|| LedgerError::NotFound(format!("consultant {id}")))?;
        tx.commit()?;
        Ok(consultant)
    }

    fn consultant(&self, id: ConsultantId) -> LedgerResult<Option<Consultant>> {
        let conn = self.connect()?;
        load_consultant(&conn, id)
    }

    fn consultants(&self) -> LedgerResult<Vec<Consultant>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {CONSULTANT_COLUMNS} FROM consultants c
             JOIN accounts a ON a.id = c.account_id ORDER BY c.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut consultants = Vec::new();
        while let Some(row) = rows.next()? {
            consultants.push(row_to_consultant(row)?);
        }
        Ok(consultants)
    }

    fn set_commission(
        &self,
        id: ConsultantId,
        overrides: CommissionOverrides,
    ) -> LedgerResult<Consultant> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE consultants SET consultant_commission_pct = ?1, user_commission_pct = ?2
             WHERE id = ?3",
            params![
                optional_percent(overrides.consultant_pct),
                optional_percent(overrides.user_pct),
                id.get()
            ],
        )?;
        if updated == 0 {
            return Err(LedgerError::NotFound(format!("consultant {id}")));
        }
        load_consultant(&conn, id)?.ok_or_else(|| LedgerError::NotFound(format!("consultant {id}")))
    }

    fn set_hourly_price(&self, id: ConsultantId, price: Decimal) -> LedgerResult<Consultant> {
        ensure_positive(price).map_err(|_| LedgerError::InvalidAmount(price))?;
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE consultants SET hourly_price = ?1 WHERE id = ?2",
            params![price.to_string(), id.get()],
        )?;
        if updated == 0 {
            return Err(LedgerError::NotFound(format!("consultant {id}")));
        }
        load_consultant(&conn, id)?.ok_or_else(|| LedgerError::NotFound(format!("consultant {id}")))
    }

    fn global_settings(&self) -> LedgerResult<Option<GlobalSettings>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT default_consultant_comm, default_user_comm, updated_at
             FROM global_settings WHERE id = 1",
        )?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_settings(row)?)),
            None => Ok(None),
        }
    }

    fn set_global_settings(
        &self,
        consultant_pct: Percent,
        user_pct: Percent,
    ) -> LedgerResult<GlobalSettings> {
        let conn = self.connect()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO global_settings (id, default_consultant_comm, default_user_comm, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 default_consultant_comm = excluded.default_consultant_comm,
                 default_user_comm = excluded.default_user_comm,
                 updated_at = excluded.updated_at",
            params![
                consultant_pct.value().to_string(),
                user_pct.value().to_string(),
                encode_ts(now)
            ],
        )?;
        Ok(GlobalSettings {
            default_consultant_comm: consultant_pct,
            default_user_comm: user_pct,
            updated_at: now,
        })
    }

    fn create_booking(&self, user: AccountId, consultant: ConsultantId) -> LedgerResult<Booking> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if user == self.options.platform_account {
            return Err(LedgerError::InvalidState(
                "the platform account cannot book sessions".into(),
            ));
        }
        if load_account(&tx, user)?.is_none() {
            return Err(LedgerError::NotFound(format!("account {user}")));
        }
        let booked = load_consultant(&tx, consultant)?
            .ok_or_else(|| LedgerError::NotFound(format!("consultant {consultant}")))?;
        if booked.account == user {
            return Err(LedgerError::InvalidState(format!(
                "consultant {consultant} cannot book their own session"
            )));
        }
        tx.execute(
            "INSERT INTO bookings (user_id, consultant_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.get(),
                consultant.get(),
                BookingStatus::Pending.as_str(),
                encode_ts(Utc::now())
            ],
        )?;
        let id = BookingId(tx.last_insert_rowid());
        let booking =
            load_booking(&tx, id)?.ok_or_else(|| LedgerError::NotFound(format!("booking {id}")))?;
        tx.commit()?;
        Ok(booking)
    }

    fn booking(&self, id: BookingId) -> LedgerResult<Option<Booking>> {
        let conn = self.connect()?;
        load_booking(&conn, id)
    }

    fn bookings_for_consultant(
        &self,
        consultant: ConsultantId,
        status: Option<BookingStatus>,
    ) -> LedgerResult<Vec<Booking>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE consultant_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            consultant.get(),
            status.map(|s| s.as_str().to_string())
        ])?;
        let mut bookings = Vec::new();
        while let Some(row) = rows.next()? {
            bookings.push(row_to_booking(row)?);
        }
        Ok(bookings)
    }

    fn transition_booking(&self, id: BookingId, next: BookingStatus) -> LedgerResult<Booking> {
        if next == BookingStatus::Settled {
            return Err(LedgerError::InvalidState(
                "bookings reach SETTLED only through settlement".into(),
            ));
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let booking =
            load_booking(&tx, id)?.ok_or_else(|| LedgerError::NotFound(format!("booking {id}")))?;
        let status = booking.status.transition(next)?;
        tx.execute(
            "UPDATE bookings SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.get()],
        )?;
        let booking =
            load_booking(&tx, id)?.ok_or_else(|| LedgerError::NotFound(format!("booking {id}")))?;
        tx.commit()?;
        Ok(booking)
    }
}

fn load_account(conn: &Connection, id: AccountId) -> LedgerResult<Option<User>> {
    let mut stmt = conn.prepare("SELECT id, name, email, created_at FROM accounts WHERE id = ?1")?;
    let mut rows = stmt.query(params![id.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_user(row)?)),
        None => Ok(None),
    }
}

fn load_consultant(conn: &Connection, id: ConsultantId) -> LedgerResult<Option<Consultant>> {
    let sql = format!(
        "SELECT {CONSULTANT_COLUMNS} FROM consultants c
         JOIN accounts a ON a.id = c.account_id WHERE c.id = ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_consultant(row)?)),
        None => Ok(None),
    }
}
