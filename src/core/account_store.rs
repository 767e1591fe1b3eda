//! Thread-safe in-memory account store
//!
//! This module provides `InMemoryAccountStore`, an [`AccountStore`] backed by
//! `DashMap`.
//!
//! # Design
//!
//! Each balance operation runs inside `DashMap::get_mut`, which holds the
//! shard lock for that account for the duration of the closure. Operations
//! on the same account are therefore serialized, operations on different
//! accounts proceed in parallel, and no caller ever reads a balance, computes
//! a new value and writes it back outside the lock.

use super::traits::AccountStore;
use crate::types::{Account, AccountId, NewAccount, OwnerId, PaymentError};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Account store with per-row locking
#[derive(Debug)]
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountId, Account>,
    next_id: AtomicU64,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Apply `f` to the account while holding its row lock
    ///
    /// `f` must validate before it assigns, so an error leaves the row
    /// untouched.
    fn update<F>(&self, id: AccountId, f: F) -> Result<Account, PaymentError>
    where
        F: FnOnce(&mut Account) -> Result<(), PaymentError>,
    {
        let mut entry = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| PaymentError::account_not_found(id))?;
        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn create(&self, account: NewAccount) -> Account {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let account = account.into_account(id);
        self.accounts.insert(id, account.clone());
        account
    }

    fn insert(&self, account: Account) {
        self.next_id.fetch_max(account.id + 1, Ordering::SeqCst);
        self.accounts.insert(account.id, account);
    }

    fn find(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }

    fn find_by_owner(&self, owner: OwnerId) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    fn all(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    fn hold(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(id, |account| {
            let available = account.available();
            if available < amount {
                return Err(PaymentError::insufficient_balance(id, available, amount));
            }
            account.held = account
                .held
                .checked_add(amount)
                .ok_or_else(|| PaymentError::arithmetic_overflow("hold", id))?;
            Ok(())
        })
    }

    fn release(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(id, |account| {
            account.held = account
                .held
                .checked_sub(amount)
                .ok_or_else(|| PaymentError::arithmetic_overflow("release", id))?;
            Ok(())
        })
    }

    fn capture(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(id, |account| {
            let balance = account
                .balance
                .checked_sub(amount)
                .ok_or_else(|| PaymentError::arithmetic_overflow("capture", id))?;
            let held = account
                .held
                .checked_sub(amount)
                .ok_or_else(|| PaymentError::arithmetic_overflow("capture", id))?;
            account.balance = balance;
            account.held = held;
            Ok(())
        })
    }

    fn restore(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(id, |account| {
            let balance = account
                .balance
                .checked_add(amount)
                .ok_or_else(|| PaymentError::arithmetic_overflow("restore", id))?;
            let held = account
                .held
                .checked_add(amount)
                .ok_or_else(|| PaymentError::arithmetic_overflow("restore", id))?;
            account.balance = balance;
            account.held = held;
            Ok(())
        })
    }

    fn receive(&self, id: AccountId, amount: Decimal) -> Result<Account, PaymentError> {
        self.update(id, |account| {
            if !account.account_type.is_asset() && account.balance < amount {
                return Err(PaymentError::overpayment(id, account.balance, amount));
            }
            account.balance = account
                .balance
                .checked_add(account.account_type.incoming_delta(amount))
                .ok_or_else(|| PaymentError::arithmetic_overflow("receive", id))?;
            Ok(())
        })
    }

    fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account, PaymentError> {
        self.update(id, |account| {
            account.balance = account
                .balance
                .checked_add(delta)
                .ok_or_else(|| PaymentError::arithmetic_overflow("adjust_balance", id))?;
            Ok(())
        })
    }
}
