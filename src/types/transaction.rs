//! Transaction-related types for the payments ledger
//!
//! This module defines transaction kinds, the status state machine, the
//! request used to initiate a transaction and the stored record.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Transaction identifier
pub type TransactionId = u64;

/// Remarks attached to transactions created by the recurring scheduler
pub const RECURRING_PAYMENT_REMARKS: &str = "RECURRING PAYMENT";

/// Remarks attached to withdrawals
pub const WITHDRAWAL_REMARKS: &str = "WITHDRAWAL";

/// Kinds of transaction supported by the lifecycle manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Account-to-account transfer initiated by a user
    Transfer,

    /// Funds leaving the ledger from a DEBIT account; no recipient
    Withdrawal,

    /// Account-to-account payment driven by a recurring schedule
    Payment,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Payment => "PAYMENT",
        };
        f.write_str(name)
    }
}

/// Transaction lifecycle status
///
/// `Processing` is the only non-terminal state. `Completed` and `Failed`
/// are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Processing,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Processing)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Intent to move money, validated before any record is created
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRequest {
    pub tx_type: TransactionType,
    pub sender: AccountId,

    /// `None` only for withdrawals
    pub recipient: Option<AccountId>,

    /// Positive amount moved from sender to recipient
    pub amount: Decimal,
    pub currency: String,
    pub remarks: Option<String>,
}

impl TransactionRequest {
    pub fn transfer(
        sender: AccountId,
        recipient: AccountId,
        amount: Decimal,
        currency: impl Into<String>,
        remarks: Option<String>,
    ) -> Self {
        Self {
            tx_type: TransactionType::Transfer,
            sender,
            recipient: Some(recipient),
            amount,
            currency: currency.into(),
            remarks,
        }
    }

    pub fn withdrawal(sender: AccountId, amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            tx_type: TransactionType::Withdrawal,
            sender,
            recipient: None,
            amount,
            currency: currency.into(),
            remarks: Some(WITHDRAWAL_REMARKS.to_string()),
        }
    }

    pub fn recurring_payment(
        sender: AccountId,
        recipient: AccountId,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            tx_type: TransactionType::Payment,
            sender,
            recipient: Some(recipient),
            amount,
            currency: currency.into(),
            remarks: Some(RECURRING_PAYMENT_REMARKS.to_string()),
        }
    }
}

/// Persisted transaction record
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub sender: AccountId,
    pub recipient: Option<AccountId>,
    pub amount: Decimal,
    pub currency: String,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub remarks: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Whether `account` is either side of this transaction
    pub fn involves(&self, account: AccountId) -> bool {
        self.sender == account || self.recipient == Some(account)
    }
}

/// Transaction record as held by the store
///
/// `claimed` is set by the first settlement attempt that wins the
/// compare-and-set on `Processing`; any later attempt is rejected.
#[derive(Debug, Clone)]
pub struct StoredTransaction {
    pub transaction: Transaction,
    pub claimed: bool,
}
