use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use consultpay_core::{
    AccountId, Booking, BookingId, BookingSnapshot, BookingStatus, Consultant, ConsultantId,
    GlobalSettings, PayoutId, Percent, TransactionId, User,
};
use rusqlite::types::Value;
use rusqlite::Row;
use rust_decimal::Decimal;

use crate::{LedgerError, LedgerResult, Payout, PayoutStatus, Transaction, WalletCache};

pub(super) const TRANSACTION_COLUMNS: &str =
    "id, account_id, kind, amount, booking_id, consultant_id, status, description, created_at";
pub(super) const PAYOUT_COLUMNS: &str =
    "id, consultant_id, amount, status, notes, paid_at, created_at";
pub(super) const BOOKING_COLUMNS: &str = "id, user_id, consultant_id, status, consultant_fee, \
     amount_deducted_from_user, commission_fee, consultant_earning, subsidised, \
     settlement_error, created_at, settled_at";
pub(super) const CONSULTANT_COLUMNS: &str = "c.id, c.account_id, a.name, a.email, c.hourly_price, \
     c.consultant_commission_pct, c.user_commission_pct";

/// Fixed-width timestamps keep lexical order equal to chronological order.
pub(super) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn optional_text(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

pub(super) fn optional_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

pub(super) fn optional_percent(value: Option<Percent>) -> Option<String> {
    value.map(|pct| pct.value().to_string())
}

fn decode_ts(raw: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| LedgerError::Serialization(format!("invalid timestamp {raw}: {err}")))
}

fn decode_decimal(raw: &str) -> LedgerResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|err| LedgerError::Serialization(format!("invalid decimal {raw}: {err}")))
}

fn decode_percent(raw: &str) -> LedgerResult<Percent> {
    Percent::new(decode_decimal(raw)?).map_err(LedgerError::from)
}

fn decode_optional<T>(
    raw: Option<String>,
    decode: impl Fn(&str) -> LedgerResult<T>,
) -> LedgerResult<Option<T>> {
    raw.as_deref().map(decode).transpose()
}

pub(super) fn row_to_transaction(row: &Row<'_>) -> LedgerResult<Transaction> {
    let kind: String = row.get(2)?;
    let amount: String = row.get(3)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    Ok(Transaction {
        id: TransactionId(row.get(0)?),
        account: AccountId(row.get(1)?),
        kind: kind.parse().map_err(LedgerError::Serialization)?,
        amount: decode_decimal(&amount)?,
        booking: row.get::<_, Option<i64>>(4)?.map(BookingId),
        consultant: row.get::<_, Option<i64>>(5)?.map(ConsultantId),
        status: status.parse().map_err(LedgerError::Serialization)?,
        description: row.get(7)?,
        created_at: decode_ts(&created_at)?,
    })
}

pub(super) fn row_to_payout(row: &Row<'_>) -> LedgerResult<Payout> {
    let amount: String = row.get(2)?;
    let status: String = row.get(3)?;
    let paid_at: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(Payout {
        id: PayoutId(row.get(0)?),
        consultant: ConsultantId(row.get(1)?),
        amount: decode_decimal(&amount)?,
        status: PayoutStatus::from_str(&status).map_err(LedgerError::Serialization)?,
        notes: row.get(4)?,
        paid_at: decode_optional(paid_at, decode_ts)?,
        created_at: decode_ts(&created_at)?,
    })
}

pub(super) fn row_to_booking(row: &Row<'_>) -> LedgerResult<Booking> {
    let status: String = row.get(3)?;
    let consultant_fee: Option<String> = row.get(4)?;
    let deducted: Option<String> = row.get(5)?;
    let commission: Option<String> = row.get(6)?;
    let earning: Option<String> = row.get(7)?;
    let subsidised: bool = row.get(8)?;
    let created_at: String = row.get(10)?;
    let settled_at: Option<String> = row.get(11)?;

    let snapshot = match (consultant_fee, deducted, commission, earning) {
        (Some(fee), Some(deducted), Some(commission), Some(earning)) => Some(BookingSnapshot {
            consultant_fee: decode_decimal(&fee)?,
            amount_deducted_from_user: decode_decimal(&deducted)?,
            commission_fee: decode_decimal(&commission)?,
            consultant_earning: decode_decimal(&earning)?,
            subsidised,
        }),
        (None, None, None, None) => None,
        _ => {
            return Err(LedgerError::InvalidState(
                "booking snapshot is partially populated".into(),
            ))
        }
    };

    Ok(Booking {
        id: BookingId(row.get(0)?),
        user: AccountId(row.get(1)?),
        consultant: ConsultantId(row.get(2)?),
        status: BookingStatus::from_str(&status)?,
        snapshot,
        settlement_error: row.get(9)?,
        created_at: decode_ts(&created_at)?,
        settled_at: decode_optional(settled_at, decode_ts)?,
    })
}

pub(super) fn row_to_consultant(row: &Row<'_>) -> LedgerResult<Consultant> {
    let hourly_price: String = row.get(4)?;
    Ok(Consultant {
        id: ConsultantId(row.get(0)?),
        account: AccountId(row.get(1)?),
        name: row.get(2)?,
        email: row.get(3)?,
        hourly_price: decode_decimal(&hourly_price)?,
        consultant_commission_pct: decode_optional(row.get(5)?, decode_percent)?,
        user_commission_pct: decode_optional(row.get(6)?, decode_percent)?,
    })
}

pub(super) fn row_to_user(row: &Row<'_>) -> LedgerResult<User> {
    let created_at: String = row.get(3)?;
    Ok(User {
        id: AccountId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: decode_ts(&created_at)?,
    })
}

pub(super) fn row_to_settings(row: &Row<'_>) -> LedgerResult<GlobalSettings> {
    let consultant: String = row.get(0)?;
    let user: String = row.get(1)?;
    let updated_at: String = row.get(2)?;
    Ok(GlobalSettings {
        default_consultant_comm: decode_percent(&consultant)?,
        default_user_comm: decode_percent(&user)?,
        updated_at: decode_ts(&updated_at)?,
    })
}

pub(super) fn row_to_wallet(row: &Row<'_>) -> LedgerResult<WalletCache> {
    let balance: String = row.get(1)?;
    let updated_at: String = row.get(3)?;
    Ok(WalletCache {
        account: AccountId(row.get(0)?),
        balance: decode_decimal(&balance)?,
        last_transaction: TransactionId(row.get(2)?),
        updated_at: decode_ts(&updated_at)?,
    })
}
