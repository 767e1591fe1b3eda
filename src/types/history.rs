//! Payment history types
//!
//! A completed transfer or payment is recorded as a double-entry pair: a
//! negative entry against the sender and a positive entry against the
//! recipient, summing to zero.

use super::account::AccountId;
use super::transaction::TransactionId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// One signed leg of a completed transaction
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentHistoryEntry {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,

    /// Negative for the sending side, positive for the receiving side
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Build the sender/recipient pair for a completed transaction
pub fn double_entry(
    sender: AccountId,
    recipient: AccountId,
    transaction_id: TransactionId,
    amount: Decimal,
    created_at: DateTime<Utc>,
) -> [PaymentHistoryEntry; 2] {
    [
        PaymentHistoryEntry {
            account_id: sender,
            transaction_id,
            amount: -amount,
            created_at,
        },
        PaymentHistoryEntry {
            account_id: recipient,
            transaction_id,
            amount,
            created_at,
        },
    ]
}
