//! Payment history recorder
//!
//! Appends the double-entry pair for each completed transaction. Entries are
//! keyed by transaction id, so a transaction can be recorded at most once.

use super::traits::Clock;
use crate::types::{double_entry, AccountId, PaymentError, PaymentHistoryEntry, TransactionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Debug)]
pub struct PaymentHistoryRecorder {
    entries: DashMap<TransactionId, [PaymentHistoryEntry; 2]>,
    clock: Arc<dyn Clock>,
}

impl PaymentHistoryRecorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Write the signed pair for a completed transaction
    ///
    /// Fails with `HistoryAlreadyRecorded` if the transaction already has
    /// entries. Failures are logged here and returned to the caller.
    pub fn record(
        &self,
        sender: AccountId,
        recipient: AccountId,
        transaction_id: TransactionId,
        amount: Decimal,
    ) -> Result<(), PaymentError> {
        match self.entries.entry(transaction_id) {
            Entry::Occupied(_) => {
                let err = PaymentError::history_already_recorded(transaction_id);
                error!(transaction_id, error = %err, "Failed to record payment history");
                Err(err)
            }
            Entry::Vacant(slot) => {
                slot.insert(double_entry(
                    sender,
                    recipient,
                    transaction_id,
                    amount,
                    self.clock.now(),
                ));
                debug!(transaction_id, sender, recipient, %amount, "Recorded payment history");
                Ok(())
            }
        }
    }

    pub fn for_transaction(&self, transaction_id: TransactionId) -> Vec<PaymentHistoryEntry> {
        self.entries
            .get(&transaction_id)
            .map(|pair| pair.value().to_vec())
            .unwrap_or_default()
    }

    /// Entries touching `account`, newest first
    pub fn for_account(&self, account: AccountId) -> Vec<PaymentHistoryEntry> {
        let mut entries: Vec<PaymentHistoryEntry> = self
            .entries
            .iter()
            .flat_map(|pair| pair.value().to_vec())
            .filter(|entry| entry.account_id == account)
            .collect();
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.transaction_id.cmp(&a.transaction_id))
        });
        entries
    }
}
