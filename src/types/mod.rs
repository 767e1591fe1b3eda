//! Types module
//!
//! Contains core data structures used throughout the application:
//! - `account`: Account records and account types
//! - `transaction`: Transaction records, requests and status machine
//! - `recurring`: Recurring payments and interval arithmetic
//! - `history`: Double-entry payment history
//! - `error`: Error types for the payments ledger

pub mod account;
pub mod error;
pub mod history;
pub mod recurring;
pub mod transaction;

pub use account::{Account, AccountId, AccountType, NewAccount, OwnerId};
pub use error::PaymentError;
pub use history::{double_entry, PaymentHistoryEntry};
pub use recurring::{
    Interval, IntervalUnit, NewRecurringPayment, RecurringPayment, RecurringPaymentId,
    RecurringPaymentUpdate, RecurringStatus,
};
pub use transaction::{
    StoredTransaction, Transaction, TransactionId, TransactionRequest, TransactionStatus,
    TransactionType, RECURRING_PAYMENT_REMARKS, WITHDRAWAL_REMARKS,
};
