//! Account-related types for the payments ledger
//!
//! This module defines the Account structure and the account type taxonomy
//! used to decide the sign of an incoming payment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Account identifier
pub type AccountId = u64;

/// Identifier of the user that owns an account
pub type OwnerId = u64;

/// Kind of payment account
///
/// DEBIT accounts are asset accounts: an incoming payment increases the
/// balance. CREDIT and LOAN accounts are liability-style: the balance is the
/// outstanding amount, and an incoming payment pays it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    Debit,
    Credit,
    Loan,
}

impl AccountType {
    /// Whether an incoming payment increases this account's balance
    pub fn is_asset(self) -> bool {
        matches!(self, AccountType::Debit)
    }

    /// Signed balance delta for an incoming payment of `amount`
    pub fn incoming_delta(self, amount: Decimal) -> Decimal {
        if self.is_asset() {
            amount
        } else {
            -amount
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountType::Debit => "DEBIT",
            AccountType::Credit => "CREDIT",
            AccountType::Loan => "LOAN",
        };
        f.write_str(name)
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Ok(AccountType::Debit),
            "credit" => Ok(AccountType::Credit),
            "loan" => Ok(AccountType::Loan),
            other => Err(format!("Invalid account type: '{}'", other)),
        }
    }
}

/// Payment account state
///
/// `balance` is authoritative and only changes when a completed transaction
/// is applied. `held` is the sum of amounts reserved by transactions that are
/// still `PROCESSING`; it never changes `balance` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,

    /// The user that owns this account
    pub owner: OwnerId,

    pub account_type: AccountType,

    /// Signed balance
    ///
    /// For DEBIT accounts this is the funds on deposit. For CREDIT/LOAN
    /// accounts it is the outstanding amount.
    pub balance: Decimal,

    /// Funds earmarked by in-flight transactions
    pub held: Decimal,

    /// ISO currency code, e.g. "SGD"
    pub currency: String,

    // Credit-line fields, only meaningful for CREDIT/LOAN accounts
    pub interest_rate: Option<Decimal>,
    pub available_amount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Account {
    /// Balance that may still be committed to new transactions
    pub fn available(&self) -> Decimal {
        self.balance - self.held
    }

    /// Whether the account has an end date strictly after `now`
    pub fn ends_after(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end > now)
    }
}

/// Request to open a new account
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub owner: OwnerId,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub currency: String,
    pub interest_rate: Option<Decimal>,
    pub available_amount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewAccount {
    /// A plain account with no credit-line fields
    pub fn new(
        owner: OwnerId,
        account_type: AccountType,
        balance: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            account_type,
            balance,
            currency: currency.into(),
            interest_rate: None,
            available_amount: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub(crate) fn into_account(self, id: AccountId) -> Account {
        Account {
            id,
            owner: self.owner,
            account_type: self.account_type,
            balance: self.balance,
            held: Decimal::ZERO,
            currency: self.currency,
            interest_rate: self.interest_rate,
            available_amount: self.available_amount,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case::debit(AccountType::Debit, Decimal::new(25, 0))]
    #[case::credit(AccountType::Credit, Decimal::new(-25, 0))]
    #[case::loan(AccountType::Loan, Decimal::new(-25, 0))]
    fn test_incoming_delta(#[case] account_type: AccountType, #[case] expected: Decimal) {
        assert_eq!(account_type.incoming_delta(Decimal::new(25, 0)), expected);
    }

    #[rstest]
    #[case("debit", AccountType::Debit)]
    #[case("CREDIT", AccountType::Credit)]
    #[case(" Loan ", AccountType::Loan)]
    fn test_account_type_from_str(#[case] input: &str, #[case] expected: AccountType) {
        assert_eq!(input.parse::<AccountType>().unwrap(), expected);
    }

    #[test]
    fn test_account_type_from_str_rejects_unknown() {
        assert!("savings".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_available_subtracts_held() {
        let mut account =
            NewAccount::new(1, AccountType::Debit, Decimal::new(100, 0), "SGD").into_account(7);
        account.held = Decimal::new(30, 0);

        assert_eq!(account.id, 7);
        assert_eq!(account.available(), Decimal::new(70, 0));
    }

    #[test]
    fn test_ends_after() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let account = NewAccount::new(1, AccountType::Loan, Decimal::ZERO, "SGD");

        assert!(!account.clone().into_account(1).ends_after(now));
        assert!(account
            .clone()
            .with_end_date(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap())
            .into_account(1)
            .ends_after(now));
        assert!(!account
            .with_end_date(now)
            .into_account(1)
            .ends_after(now));
    }
}
