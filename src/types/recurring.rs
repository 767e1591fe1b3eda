//! Recurring payment types
//!
//! Defines the recurring payment record, its status machine and the interval
//! arithmetic used to compute the next due date.

use super::account::AccountId;
use super::error::PaymentError;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Recurring payment identifier
pub type RecurringPaymentId = u64;

/// Unit of a recurring interval
///
/// MONTH and YEAR are fixed approximations (30 and 365 days), not calendar
/// months or years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    /// Length of one unit in days
    pub fn days(self) -> i64 {
        match self {
            IntervalUnit::Day => 1,
            IntervalUnit::Week => 7,
            IntervalUnit::Month => 30,
            IntervalUnit::Year => 365,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntervalUnit::Day => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Year => "YEAR",
        };
        f.write_str(name)
    }
}

impl FromStr for IntervalUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(IntervalUnit::Day),
            "week" => Ok(IntervalUnit::Week),
            "month" => Ok(IntervalUnit::Month),
            "year" => Ok(IntervalUnit::Year),
            other => Err(format!("Invalid interval unit: '{}'", other)),
        }
    }
}

/// A positive number of interval units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    value: u32,
    unit: IntervalUnit,
}

impl Interval {
    /// Create an interval; `value` must be positive
    pub fn new(value: u32, unit: IntervalUnit) -> Result<Self, PaymentError> {
        if value == 0 {
            return Err(PaymentError::invalid_interval(value, unit));
        }
        Ok(Self { value, unit })
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Total length of the interval
    pub fn duration(&self) -> Result<TimeDelta, PaymentError> {
        i64::from(self.value)
            .checked_mul(self.unit.days())
            .and_then(TimeDelta::try_days)
            .ok_or_else(|| PaymentError::invalid_interval(self.value, self.unit))
    }

    /// The instant one interval after `from`
    pub fn advance(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>, PaymentError> {
        from.checked_add_signed(self.duration()?)
            .ok_or_else(|| PaymentError::invalid_interval(self.value, self.unit))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Recurring payment status
///
/// `Completed` and `Canceled` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurringStatus {
    Active,
    Paused,
    Disabled,
    Completed,
    Canceled,
}

impl RecurringStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecurringStatus::Completed | RecurringStatus::Canceled)
    }
}

impl fmt::Display for RecurringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecurringStatus::Active => "ACTIVE",
            RecurringStatus::Paused => "PAUSED",
            RecurringStatus::Disabled => "DISABLED",
            RecurringStatus::Completed => "COMPLETED",
            RecurringStatus::Canceled => "CANCELED",
        };
        f.write_str(name)
    }
}

impl FromStr for RecurringStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(RecurringStatus::Active),
            "paused" => Ok(RecurringStatus::Paused),
            "disabled" => Ok(RecurringStatus::Disabled),
            "completed" => Ok(RecurringStatus::Completed),
            "canceled" | "cancelled" => Ok(RecurringStatus::Canceled),
            other => Err(format!("Invalid recurring payment status: '{}'", other)),
        }
    }
}

/// A periodic payment from one account to another
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringPayment {
    pub id: RecurringPaymentId,
    pub sender: AccountId,
    pub recipient: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub interval: Interval,
    pub next_payment_date: DateTime<Utc>,
    pub status: RecurringStatus,
}

impl RecurringPayment {
    /// Active and scheduled at or before `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == RecurringStatus::Active && self.next_payment_date <= now
    }
}

/// Request to create a recurring payment
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecurringPayment {
    pub sender: AccountId,
    pub recipient: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub interval: Interval,
    pub next_payment_date: DateTime<Utc>,
    pub status: RecurringStatus,
}

impl NewRecurringPayment {
    /// An `Active` recurring payment
    pub fn new(
        sender: AccountId,
        recipient: AccountId,
        amount: Decimal,
        currency: impl Into<String>,
        interval: Interval,
        next_payment_date: DateTime<Utc>,
    ) -> Self {
        Self {
            sender,
            recipient,
            amount,
            currency: currency.into(),
            interval,
            next_payment_date,
            status: RecurringStatus::Active,
        }
    }

    pub(crate) fn into_payment(self, id: RecurringPaymentId) -> RecurringPayment {
        RecurringPayment {
            id,
            sender: self.sender,
            recipient: self.recipient,
            amount: self.amount,
            currency: self.currency,
            interval: self.interval,
            next_payment_date: self.next_payment_date,
            status: self.status,
        }
    }
}

/// Changes to an existing recurring payment
///
/// Every field is optional; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurringPaymentUpdate {
    pub sender: Option<AccountId>,
    pub recipient: Option<AccountId>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub interval: Option<Interval>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub status: Option<RecurringStatus>,
}

impl RecurringPaymentUpdate {
    /// An update that only changes the status
    pub fn status(status: RecurringStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// The record as it would look after this update
    pub fn applied_to(&self, payment: &RecurringPayment) -> RecurringPayment {
        RecurringPayment {
            id: payment.id,
            sender: self.sender.unwrap_or(payment.sender),
            recipient: self.recipient.unwrap_or(payment.recipient),
            amount: self.amount.unwrap_or(payment.amount),
            currency: self
                .currency
                .clone()
                .unwrap_or_else(|| payment.currency.clone()),
            interval: self.interval.unwrap_or(payment.interval),
            next_payment_date: self.next_payment_date.unwrap_or(payment.next_payment_date),
            status: self.status.unwrap_or(payment.status),
        }
    }
}
