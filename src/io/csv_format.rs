//! CSV format handling for seed files and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `AccountRow` / `RecurringPaymentRow` structures for deserialization
//! - Conversion from CSV rows to domain types
//! - Account output serialization
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{
    Account, AccountId, AccountType, Interval, IntervalUnit, OwnerId, PaymentError,
    RecurringPayment, RecurringPaymentId, RecurringStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Account seed row
///
/// Columns: id, owner, type, balance, currency, interest_rate,
/// available_amount, start_date, end_date. The last four are optional and
/// only meaningful for CREDIT/LOAN accounts.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountRow {
    pub id: AccountId,
    pub owner: OwnerId,
    #[serde(rename = "type")]
    pub account_type: String,
    pub balance: String,
    pub currency: String,
    pub interest_rate: Option<String>,
    pub available_amount: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Recurring payment seed row
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RecurringPaymentRow {
    pub id: RecurringPaymentId,
    pub sender: AccountId,
    pub recipient: AccountId,
    pub amount: String,
    pub currency: String,
    pub interval_value: u32,
    pub interval_unit: String,
    pub next_payment_date: String,
    pub status: Option<String>,
}

/// Convert an `AccountRow` to an `Account` with nothing held
pub fn convert_account_row(row: AccountRow) -> Result<Account, String> {
    let account_type = AccountType::from_str(&row.account_type)?;
    let balance = parse_decimal("balance", &row.balance)?;

    Ok(Account {
        id: row.id,
        owner: row.owner,
        account_type,
        balance,
        held: Decimal::ZERO,
        currency: row.currency,
        interest_rate: optional(row.interest_rate)
            .map(|value| parse_decimal("interest_rate", &value))
            .transpose()?,
        available_amount: optional(row.available_amount)
            .map(|value| parse_decimal("available_amount", &value))
            .transpose()?,
        start_date: optional(row.start_date)
            .map(|value| parse_timestamp(&value))
            .transpose()?,
        end_date: optional(row.end_date)
            .map(|value| parse_timestamp(&value))
            .transpose()?,
    })
}

/// Convert a `RecurringPaymentRow` to a `RecurringPayment`
///
/// A missing status means `ACTIVE`.
pub fn convert_recurring_payment_row(row: RecurringPaymentRow) -> Result<RecurringPayment, String> {
    let amount = parse_decimal("amount", &row.amount)?;
    if amount <= Decimal::ZERO {
        return Err(PaymentError::invalid_amount(amount).to_string());
    }
    let unit = IntervalUnit::from_str(&row.interval_unit)?;
    let interval = Interval::new(row.interval_value, unit).map_err(|e| e.to_string())?;
    let status = match optional(row.status) {
        Some(status) => RecurringStatus::from_str(&status)?,
        None => RecurringStatus::Active,
    };

    Ok(RecurringPayment {
        id: row.id,
        sender: row.sender,
        recipient: row.recipient,
        amount,
        currency: row.currency,
        interval,
        next_payment_date: parse_timestamp(&row.next_payment_date)?,
        status,
    })
}

/// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date as midnight UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid timestamp: '{}'", value))
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("Invalid {} '{}'", field, value))
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Write account states to CSV format
///
/// Columns: id, owner, type, balance, held, currency. Accounts are sorted by
/// id for deterministic output; amounts are printed with four decimals.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), PaymentError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["id", "owner", "type", "balance", "held", "currency"])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer.write_record(&[
            account.id.to_string(),
            account.owner.to_string(),
            account.account_type.to_string(),
            format!("{:.4}", account.balance),
            format!("{:.4}", account.held),
            account.currency,
        ])?;
    }

    writer.flush()?;
    Ok(())
}
