//! Core traits at the persistence and clock seams
//!
//! The lifecycle manager and scheduler talk to account records only through
//! [`AccountStore`], so an in-memory map and a database-backed store can be
//! used interchangeably.

use crate::types::{Account, AccountId, NewAccount, OwnerId, PaymentError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt::Debug;

/// Typed access to account records
///
/// Every balance mutation is a single atomic operation on one account row.
/// Implementations must never let two writers to the same row interleave;
/// a store that detects a lost race reports
/// [`PaymentError::PersistenceConflict`] and the caller retries.
pub trait AccountStore: Send + Sync + Debug {
    /// Create a new account with a fresh id
    fn create(&self, account: NewAccount) -> Account;

    /// Store an account under its own id, replacing any existing record
    fn insert(&self, account: Account);

    fn find(&self, id: AccountId) -> Option<Account>;

    fn find_by_owner(&self, owner: OwnerId) -> Vec<Account>;

    /// All accounts, ordered by id
    fn all(&self) -> Vec<Account>;

    /// Earmark `amount` for an in-flight transaction
    ///
    /// Fails with `InsufficientBalance` if `balance - held < amount`.
    fn hold(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError>;

    /// Drop a hold without touching the balance
    fn release(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError>;

    /// Turn a hold into a debit: `balance -= amount`, `held -= amount`
    fn capture(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError>;

    /// Reverse a [`capture`](AccountStore::capture), restoring balance and hold
    fn restore(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError>;

    /// Book an incoming payment of `amount`
    ///
    /// A DEBIT balance grows; a CREDIT/LOAN balance is paid down and the
    /// call fails with `Overpayment` if `amount` exceeds what is owed. The
    /// check and the write happen under the same row lock.
    fn receive(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError>;

    /// Atomic signed increment of the balance
    fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account, PaymentError>;
}

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}
