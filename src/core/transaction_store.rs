//! Thread-safe transaction storage
//!
//! This module provides the `TransactionStore` struct, which keeps every
//! transaction record in a `DashMap` and enforces the status state machine.
//!
//! # Status transitions
//!
//! Records are created `PROCESSING`. A settlement first [`claim`]s the record
//! (compare-and-set on `PROCESSING` + unclaimed), applies its effects, then
//! [`finish`]es it with a terminal status. A second settlement for the same
//! id fails to claim, so a duplicate or delayed callback can never apply a
//! balance delta twice.
//!
//! [`claim`]: TransactionStore::claim
//! [`finish`]: TransactionStore::finish

use crate::types::{
    AccountId, PaymentError, StoredTransaction, Transaction, TransactionId, TransactionRequest,
    TransactionStatus,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe transaction store
///
/// Operations on the same transaction are serialized by the map's entry
/// lock; operations on different transactions proceed concurrently.
#[derive(Debug)]
pub struct TransactionStore {
    transactions: DashMap<TransactionId, StoredTransaction>,
    next_id: AtomicU64,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Persist a new `PROCESSING` record for `request`
    pub fn create(&self, request: &TransactionRequest, timestamp: DateTime<Utc>) -> Transaction {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let transaction = Transaction {
            id,
            sender: request.sender,
            recipient: request.recipient,
            amount: request.amount,
            currency: request.currency.clone(),
            tx_type: request.tx_type,
            status: TransactionStatus::Processing,
            remarks: request.remarks.clone(),
            timestamp,
        };

        self.transactions.insert(
            id,
            StoredTransaction {
                transaction: transaction.clone(),
                claimed: false,
            },
        );
        transaction
    }

    pub fn get(&self, tx_id: TransactionId) -> Option<Transaction> {
        self.transactions
            .get(&tx_id)
            .map(|entry| entry.value().transaction.clone())
    }

    /// Transactions sent or received by `account`, oldest first
    pub fn for_account(&self, account: AccountId) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.value().transaction.involves(account))
            .map(|entry| entry.value().transaction.clone())
            .collect();
        transactions.sort_by_key(|tx| tx.id);
        transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Take exclusive ownership of settling `tx_id`
    ///
    /// Succeeds exactly once per transaction, and only while it is
    /// `PROCESSING`.
    pub fn claim(&self, tx_id: TransactionId) -> Result<Transaction, PaymentError> {
        self.update(tx_id, |stored| {
            let status = stored.transaction.status;
            if stored.claimed || status.is_terminal() {
                return Err(PaymentError::transaction_already_settled(tx_id, status));
            }
            stored.claimed = true;
            Ok(())
        })
    }

    /// Write the terminal status of a claimed transaction
    pub fn finish(
        &self,
        tx_id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, PaymentError> {
        debug_assert!(status.is_terminal(), "finish requires a terminal status");

        self.update(tx_id, |stored| {
            let current = stored.transaction.status;
            if !stored.claimed || current.is_terminal() {
                return Err(PaymentError::transaction_already_settled(tx_id, current));
            }
            stored.transaction.status = status;
            Ok(())
        })
    }

    fn update<F>(&self, tx_id: TransactionId, f: F) -> Result<Transaction, PaymentError>
    where
        F: FnOnce(&mut StoredTransaction) -> Result<(), PaymentError>,
    {
        match self.transactions.get_mut(&tx_id) {
            Some(mut entry) => {
                f(entry.value_mut())?;
                Ok(entry.value().transaction.clone())
            }
            None => Err(PaymentError::transaction_not_found(tx_id)),
        }
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::thread;

    fn transfer() -> TransactionRequest {
        TransactionRequest::transfer(1, 2, Decimal::new(25, 0), "SGD", Some("rent".to_string()))
    }

    #[test]
    fn test_create_starts_processing() {
        let store = TransactionStore::new();
        let now = Utc::now();

        let tx = store.create(&transfer(), now);

        assert_eq!(tx.id, 1);
        assert_eq!(tx.status, TransactionStatus::Processing);
        assert_eq!(tx.timestamp, now);
        assert_eq!(tx.remarks.as_deref(), Some("rent"));
        assert_eq!(store.get(1), Some(tx));
    }

    #[test]
    fn test_claim_then_finish() {
        let store = TransactionStore::new();
        let tx = store.create(&transfer(), Utc::now());

        store.claim(tx.id).unwrap();
        let done = store.finish(tx.id, TransactionStatus::Completed).unwrap();

        assert_eq!(done.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_second_claim_is_rejected() {
        let store = TransactionStore::new();
        let tx = store.create(&transfer(), Utc::now());

        store.claim(tx.id).unwrap();

        assert_eq!(
            store.claim(tx.id),
            Err(PaymentError::transaction_already_settled(
                tx.id,
                TransactionStatus::Processing
            ))
        );
    }

    #[test]
    fn test_terminal_status_never_changes() {
        let store = TransactionStore::new();
        let tx = store.create(&transfer(), Utc::now());
        store.claim(tx.id).unwrap();
        store.finish(tx.id, TransactionStatus::Failed).unwrap();

        assert!(store.claim(tx.id).is_err());
        assert!(store.finish(tx.id, TransactionStatus::Completed).is_err());
        assert_eq!(store.get(tx.id).unwrap().status, TransactionStatus::Failed);
    }

    #[test]
    fn test_finish_requires_claim() {
        let store = TransactionStore::new();
        let tx = store.create(&transfer(), Utc::now());

        assert!(store.finish(tx.id, TransactionStatus::Completed).is_err());
        assert_eq!(store.get(tx.id).unwrap().status, TransactionStatus::Processing);
    }

    #[test]
    fn test_unknown_transaction() {
        let store = TransactionStore::new();
        assert_eq!(store.claim(5), Err(PaymentError::transaction_not_found(5)));
    }

    #[test]
    fn test_for_account_matches_either_side() {
        let store = TransactionStore::new();
        store.create(&transfer(), Utc::now());
        store.create(
            &TransactionRequest::withdrawal(3, Decimal::ONE, "SGD"),
            Utc::now(),
        );
        store.create(
            &TransactionRequest::transfer(2, 3, Decimal::ONE, "SGD", None),
            Utc::now(),
        );

        let ids: Vec<TransactionId> = store.for_account(2).iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.for_account(3).len(), 2);
        assert!(store.for_account(9).is_empty());
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let store = Arc::new(TransactionStore::new());
        let tx = store.create(&transfer(), Utc::now());
        let mut handles = vec![];

        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || store.claim(tx.id).is_ok()));
        }

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
