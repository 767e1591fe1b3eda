//! Error types for the payments ledger
//!
//! This module defines all error types that can occur while initiating,
//! settling and scheduling payments.
//!
//! # Error Categories
//!
//! - **Caller errors**: unknown account, insufficient balance, wrong account
//!   type, bad amount/currency/interval, unauthorized access. Raised
//!   synchronously before any record is created.
//! - **Settlement errors**: rejection or timeout from the clearing step.
//!   Recorded by moving the transaction to `FAILED`.
//! - **Persistence errors**: concurrent-update conflicts, retried internally
//!   with a bounded count before surfacing.
//! - **Seed I/O errors**: file and CSV problems in the binary's loaders.

use super::account::{AccountId, AccountType, OwnerId};
use super::recurring::{IntervalUnit, RecurringPaymentId, RecurringStatus};
use super::transaction::{TransactionId, TransactionStatus, TransactionType};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the payments ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    #[error("Account {account} not found")]
    AccountNotFound { account: AccountId },

    /// Available balance (balance minus held funds) is below the amount
    #[error(
        "Insufficient balance in account {account}: available {available}, requested {requested}"
    )]
    InsufficientBalance {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Account {account} must be of type {expected}, found {actual}")]
    InvalidAccountType {
        account: AccountId,
        expected: AccountType,
        actual: AccountType,
    },

    #[error("Amount must be greater than 0, got {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Currency mismatch for account {account}: account holds {expected}, requested {actual}")]
    CurrencyMismatch {
        account: AccountId,
        expected: String,
        actual: String,
    },

    /// An incoming payment would push a CREDIT/LOAN balance below zero
    #[error(
        "Payment of {requested} exceeds outstanding balance {outstanding} of account {account}"
    )]
    Overpayment {
        account: AccountId,
        outstanding: Decimal,
        requested: Decimal,
    },

    #[error("{tx_type} requires a recipient account")]
    MissingRecipient { tx_type: TransactionType },

    #[error("Settlement rejected for transaction {tx}: {reason}")]
    SettlementRejected { tx: TransactionId, reason: String },

    #[error("Settlement timed out for transaction {tx} after {timeout_ms}ms")]
    SettlementTimeout { tx: TransactionId, timeout_ms: u64 },

    /// Concurrent writer raced this update; retried by the caller
    #[error("Concurrent update conflict on account {account}")]
    PersistenceConflict { account: AccountId },

    #[error("Settlement queue is closed; transaction {tx} was not enqueued")]
    SettlementQueueClosed { tx: TransactionId },

    #[error("Transaction {tx} not found")]
    TransactionNotFound { tx: TransactionId },

    /// A settlement for this transaction already claimed it
    #[error("Transaction {tx} is already settled ({status})")]
    TransactionAlreadySettled {
        tx: TransactionId,
        status: TransactionStatus,
    },

    #[error("Recurring payment {id} not found")]
    RecurringPaymentNotFound { id: RecurringPaymentId },

    /// Completed and canceled schedules are final
    #[error("Recurring payment {id} is {status} and can no longer be changed")]
    RecurringPaymentFinished {
        id: RecurringPaymentId,
        status: RecurringStatus,
    },

    #[error("Invalid interval: {value} {unit}")]
    InvalidInterval { value: u32, unit: IntervalUnit },

    #[error("Caller {caller} does not own account {account}")]
    Unauthorized { account: AccountId, caller: OwnerId },

    #[error("Payment history for transaction {tx} is already recorded")]
    HistoryAlreadyRecorded { tx: TransactionId },

    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow { operation: String, account: AccountId },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for PaymentError {
    fn from(error: std::io::Error) -> Self {
        PaymentError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for PaymentError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        PaymentError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl PaymentError {
    /// Whether the error is the caller's fault (4xx-equivalent)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PaymentError::AccountNotFound { .. }
                | PaymentError::InsufficientBalance { .. }
                | PaymentError::InvalidAccountType { .. }
                | PaymentError::InvalidAmount { .. }
                | PaymentError::CurrencyMismatch { .. }
                | PaymentError::Overpayment { .. }
                | PaymentError::MissingRecipient { .. }
                | PaymentError::RecurringPaymentNotFound { .. }
                | PaymentError::RecurringPaymentFinished { .. }
                | PaymentError::TransactionNotFound { .. }
                | PaymentError::InvalidInterval { .. }
                | PaymentError::Unauthorized { .. }
        )
    }

    pub fn account_not_found(account: AccountId) -> Self {
        PaymentError::AccountNotFound { account }
    }

    pub fn insufficient_balance(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        PaymentError::InsufficientBalance {
            account,
            available,
            requested,
        }
    }

    pub fn invalid_account_type(
        account: AccountId,
        expected: AccountType,
        actual: AccountType,
    ) -> Self {
        PaymentError::InvalidAccountType {
            account,
            expected,
            actual,
        }
    }

    pub fn invalid_amount(amount: Decimal) -> Self {
        PaymentError::InvalidAmount { amount }
    }

    pub fn currency_mismatch(account: AccountId, expected: &str, actual: &str) -> Self {
        PaymentError::CurrencyMismatch {
            account,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn overpayment(account: AccountId, outstanding: Decimal, requested: Decimal) -> Self {
        PaymentError::Overpayment {
            account,
            outstanding,
            requested,
        }
    }

    pub fn missing_recipient(tx_type: TransactionType) -> Self {
        PaymentError::MissingRecipient { tx_type }
    }

    pub fn settlement_queue_closed(tx: TransactionId) -> Self {
        PaymentError::SettlementQueueClosed { tx }
    }

    pub fn settlement_rejected(tx: TransactionId, reason: &str) -> Self {
        PaymentError::SettlementRejected {
            tx,
            reason: reason.to_string(),
        }
    }

    pub fn settlement_timeout(tx: TransactionId, timeout_ms: u64) -> Self {
        PaymentError::SettlementTimeout { tx, timeout_ms }
    }

    pub fn persistence_conflict(account: AccountId) -> Self {
        PaymentError::PersistenceConflict { account }
    }

    pub fn transaction_not_found(tx: TransactionId) -> Self {
        PaymentError::TransactionNotFound { tx }
    }

    pub fn transaction_already_settled(tx: TransactionId, status: TransactionStatus) -> Self {
        PaymentError::TransactionAlreadySettled { tx, status }
    }

    pub fn recurring_payment_not_found(id: RecurringPaymentId) -> Self {
        PaymentError::RecurringPaymentNotFound { id }
    }

    pub fn recurring_payment_finished(id: RecurringPaymentId, status: RecurringStatus) -> Self {
        PaymentError::RecurringPaymentFinished { id, status }
    }

    pub fn invalid_interval(value: u32, unit: IntervalUnit) -> Self {
        PaymentError::InvalidInterval { value, unit }
    }

    pub fn unauthorized(account: AccountId, caller: OwnerId) -> Self {
        PaymentError::Unauthorized { account, caller }
    }

    pub fn history_already_recorded(tx: TransactionId) -> Self {
        PaymentError::HistoryAlreadyRecorded { tx }
    }

    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        PaymentError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::account_not_found(
        PaymentError::AccountNotFound { account: 7 },
        "Account 7 not found"
    )]
    #[case::insufficient_balance(
        PaymentError::InsufficientBalance { account: 1, available: Decimal::new(5, 0), requested: Decimal::new(50, 0) },
        "Insufficient balance in account 1: available 5, requested 50"
    )]
    #[case::invalid_account_type(
        PaymentError::InvalidAccountType { account: 3, expected: AccountType::Debit, actual: AccountType::Loan },
        "Account 3 must be of type DEBIT, found LOAN"
    )]
    #[case::settlement_timeout(
        PaymentError::SettlementTimeout { tx: 9, timeout_ms: 30000 },
        "Settlement timed out for transaction 9 after 30000ms"
    )]
    #[case::already_settled(
        PaymentError::TransactionAlreadySettled { tx: 4, status: TransactionStatus::Completed },
        "Transaction 4 is already settled (COMPLETED)"
    )]
    #[case::invalid_interval(
        PaymentError::InvalidInterval { value: 0, unit: IntervalUnit::Week },
        "Invalid interval: 0 WEEK"
    )]
    #[case::recurring_payment_finished(
        PaymentError::RecurringPaymentFinished { id: 2, status: RecurringStatus::Canceled },
        "Recurring payment 2 is CANCELED and can no longer be changed"
    )]
    #[case::missing_recipient(
        PaymentError::MissingRecipient { tx_type: TransactionType::Transfer },
        "TRANSFER requires a recipient account"
    )]
    #[case::parse_error_with_line(
        PaymentError::ParseError { line: Some(3), message: "bad field".to_string() },
        "CSV parse error at line 3: bad field"
    )]
    #[case::parse_error_without_line(
        PaymentError::ParseError { line: None, message: "bad field".to_string() },
        "CSV parse error: bad field"
    )]
    fn test_error_display(#[case] error: PaymentError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::not_found(PaymentError::account_not_found(1), true)]
    #[case::insufficient(PaymentError::insufficient_balance(1, Decimal::ZERO, Decimal::ONE), true)]
    #[case::wrong_type(PaymentError::invalid_account_type(1, AccountType::Debit, AccountType::Credit), true)]
    #[case::unauthorized(PaymentError::unauthorized(1, 2), true)]
    #[case::rejected(PaymentError::settlement_rejected(1, "declined"), false)]
    #[case::timeout(PaymentError::settlement_timeout(1, 10), false)]
    #[case::conflict(PaymentError::persistence_conflict(1), false)]
    fn test_is_caller_error(#[case] error: PaymentError, #[case] expected: bool) {
        assert_eq!(error.is_caller_error(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: PaymentError = io_error.into();
        assert!(matches!(error, PaymentError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
