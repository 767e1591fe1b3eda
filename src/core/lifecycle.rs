//! Transaction lifecycle management
//!
//! This module provides `TransactionLifecycleManager`, which creates
//! transaction records and drives them from `PROCESSING` to `COMPLETED` or
//! `FAILED`.
//!
//! # Two phases
//!
//! ```text
//! initiate:  verify sender/recipient -> hold funds -> record PROCESSING
//! settle:    clearing (bounded) -> claim -> capture sender -> credit recipient
//!            -> history pair -> COMPLETED
//!            any failure: unwind applied legs -> release hold -> FAILED
//! ```
//!
//! Initiation never touches `balance`; it only places a hold so that two
//! concurrent transactions cannot both commit the same funds. Settlement is
//! all-or-nothing from the ledger's point of view: either both legs and the
//! history pair are applied, or none are.

use super::clearing::{settle_with_timeout, ClearingSimulator, SettlementDescriptor};
use super::history::PaymentHistoryRecorder;
use super::traits::{AccountStore, Clock};
use super::transaction_store::TransactionStore;
use super::verifier::BalanceVerifier;
use crate::types::{
    AccountType, PaymentError, Transaction, TransactionId, TransactionRequest, TransactionStatus,
    TransactionType,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Shared handles the lifecycle manager is built from
#[derive(Debug, Clone)]
pub struct LedgerHandles {
    pub accounts: Arc<dyn AccountStore>,
    pub transactions: Arc<TransactionStore>,
    pub history: Arc<PaymentHistoryRecorder>,
    pub clearing: Arc<dyn ClearingSimulator>,
    pub clock: Arc<dyn Clock>,
}

/// Creates transactions and applies their effects on settlement
///
/// Cloning is cheap; every clone shares the same stores.
#[derive(Debug, Clone)]
pub struct TransactionLifecycleManager {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<TransactionStore>,
    history: Arc<PaymentHistoryRecorder>,
    clearing: Arc<dyn ClearingSimulator>,
    clock: Arc<dyn Clock>,
    verifier: BalanceVerifier,

    /// Extra attempts allowed after a `PersistenceConflict`
    max_conflict_retries: u32,
}

impl TransactionLifecycleManager {
    pub fn new(handles: LedgerHandles, max_conflict_retries: u32) -> Self {
        Self {
            verifier: BalanceVerifier::new(Arc::clone(&handles.accounts)),
            accounts: handles.accounts,
            transactions: handles.transactions,
            history: handles.history,
            clearing: handles.clearing,
            clock: handles.clock,
            max_conflict_retries,
        }
    }

    pub fn transaction(&self, tx_id: TransactionId) -> Option<Transaction> {
        self.transactions.get(tx_id)
    }

    /// Validate `request`, hold the funds and record it as `PROCESSING`
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - amount is not positive
    /// * `AccountNotFound` - sender or recipient does not exist
    /// * `InsufficientBalance` - sender cannot cover the amount
    /// * `InvalidAccountType` - withdrawal from a non-DEBIT account
    /// * `Overpayment` - payment exceeds a CREDIT/LOAN recipient's balance
    /// * `CurrencyMismatch` - request currency differs from an account's
    ///
    /// No record is created and no funds are held when this fails.
    pub fn initiate(&self, request: TransactionRequest) -> Result<Transaction, PaymentError> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::invalid_amount(request.amount));
        }

        let sender = self.verifier.verify(request.sender, request.amount)?;
        if sender.currency != request.currency {
            return Err(PaymentError::currency_mismatch(
                sender.id,
                &sender.currency,
                &request.currency,
            ));
        }

        match (request.tx_type, request.recipient) {
            (TransactionType::Withdrawal, _) => {
                if sender.account_type != AccountType::Debit {
                    return Err(PaymentError::invalid_account_type(
                        sender.id,
                        AccountType::Debit,
                        sender.account_type,
                    ));
                }
            }
            (tx_type, None) => return Err(PaymentError::missing_recipient(tx_type)),
            (_, Some(recipient_id)) => {
                let recipient = self
                    .verifier
                    .verify_recipient(recipient_id, request.amount)?;
                if recipient.currency != request.currency {
                    return Err(PaymentError::currency_mismatch(
                        recipient.id,
                        &recipient.currency,
                        &request.currency,
                    ));
                }
            }
        }

        // Withdrawals never carry a recipient, whatever the caller passed
        let request = if request.tx_type == TransactionType::Withdrawal {
            TransactionRequest {
                recipient: None,
                ..request
            }
        } else {
            request
        };

        // Re-checks sufficiency atomically; the verifier's read may be stale
        self.with_conflict_retry(|| self.accounts.hold(request.sender, request.amount))?;

        let tx = self.transactions.create(&request, self.clock.now());
        info!(
            transaction_id = tx.id,
            tx_type = %tx.tx_type,
            sender = tx.sender,
            recipient = ?tx.recipient,
            amount = %tx.amount,
            "Transaction initiated"
        );
        Ok(tx)
    }

    /// Run clearing for `tx_id` and write its terminal status
    ///
    /// Returns the completed transaction, or the error that failed it. A
    /// transaction that was already claimed by another settlement yields
    /// `TransactionAlreadySettled` and changes nothing.
    pub async fn settle(
        &self,
        tx_id: TransactionId,
        timeout: Duration,
    ) -> Result<Transaction, PaymentError> {
        let tx = self
            .transactions
            .get(tx_id)
            .ok_or_else(|| PaymentError::transaction_not_found(tx_id))?;
        if tx.status.is_terminal() {
            return Err(PaymentError::transaction_already_settled(tx_id, tx.status));
        }

        let descriptor = SettlementDescriptor::from(&tx);
        let cleared = settle_with_timeout(self.clearing.as_ref(), &descriptor, timeout).await;

        let tx = self.transactions.claim(tx_id)?;

        match cleared.and_then(|()| self.apply(&tx)) {
            Ok(()) => {
                let completed = self.transactions.finish(tx_id, TransactionStatus::Completed)?;
                info!(transaction_id = tx_id, "Transaction completed");
                Ok(completed)
            }
            Err(err) => {
                self.release_hold(&tx);
                self.transactions.finish(tx_id, TransactionStatus::Failed)?;
                warn!(transaction_id = tx_id, error = %err, "Transaction failed");
                Err(err)
            }
        }
    }

    /// Fail a `PROCESSING` transaction that will never reach clearing
    ///
    /// Releases the sender's hold and marks the transaction `FAILED`.
    pub fn abandon(&self, tx_id: TransactionId) -> Result<Transaction, PaymentError> {
        let tx = self.transactions.claim(tx_id)?;
        self.release_hold(&tx);
        let failed = self.transactions.finish(tx_id, TransactionStatus::Failed)?;
        warn!(transaction_id = tx_id, "Transaction abandoned before settlement");
        Ok(failed)
    }

    /// Apply both legs and the history pair of a claimed transaction
    ///
    /// On error every applied step has been undone and the sender's hold is
    /// back in place.
    fn apply(&self, tx: &Transaction) -> Result<(), PaymentError> {
        self.with_conflict_retry(|| self.accounts.capture(tx.sender, tx.amount))?;

        let Some(recipient_id) = tx.recipient else {
            return Ok(());
        };

        // The recipient's floor is re-checked here: other in-flight payments
        // may have paid it down since initiation
        let credited =
            self.with_conflict_retry(|| self.accounts.receive(recipient_id, tx.amount));
        let delta = match credited {
            Ok(recipient) => recipient.account_type.incoming_delta(tx.amount),
            Err(err) => {
                self.unwind_capture(tx);
                return Err(err);
            }
        };

        if let Err(err) = self
            .history
            .record(tx.sender, recipient_id, tx.id, tx.amount)
        {
            self.unwind_credit(tx, recipient_id, delta);
            self.unwind_capture(tx);
            return Err(err);
        }

        Ok(())
    }

    fn unwind_capture(&self, tx: &Transaction) {
        if let Err(err) = self.with_conflict_retry(|| self.accounts.restore(tx.sender, tx.amount)) {
            error!(
                transaction_id = tx.id,
                account_id = tx.sender,
                error = %err,
                "Failed to restore sender after aborted settlement"
            );
        }
    }

    fn unwind_credit(&self, tx: &Transaction, recipient_id: u64, delta: Decimal) {
        if let Err(err) =
            self.with_conflict_retry(|| self.accounts.adjust_balance(recipient_id, -delta))
        {
            error!(
                transaction_id = tx.id,
                account_id = recipient_id,
                error = %err,
                "Failed to reverse recipient after aborted settlement"
            );
        }
    }

    fn release_hold(&self, tx: &Transaction) {
        if let Err(err) = self.with_conflict_retry(|| self.accounts.release(tx.sender, tx.amount)) {
            error!(
                transaction_id = tx.id,
                account_id = tx.sender,
                error = %err,
                "Failed to release hold"
            );
        }
    }

    /// Run `op`, retrying up to `max_conflict_retries` times on
    /// `PersistenceConflict`
    fn with_conflict_retry<T, F>(&self, mut op: F) -> Result<T, PaymentError>
    where
        F: FnMut() -> Result<T, PaymentError>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Err(PaymentError::PersistenceConflict { account })
                    if attempt < self.max_conflict_retries =>
                {
                    attempt += 1;
                    warn!(account_id = account, attempt, "Retrying after update conflict");
                }
                result => return result,
            }
        }
    }
}
