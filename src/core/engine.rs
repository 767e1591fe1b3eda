//! Payments engine
//!
//! This module provides `PaymentsEngine`, the single entry point the
//! surrounding system talks to. It owns every store and component and wires
//! them together from an [`EngineConfig`]; nothing is global.
//!
//! # Architecture
//!
//! ```text
//! PaymentsEngine
//!     ├── Arc<dyn AccountStore>            (balances, holds)
//!     ├── Arc<TransactionStore>            (lifecycle records)
//!     ├── Arc<RecurringPaymentStore>       (schedules)
//!     ├── Arc<PaymentHistoryRecorder>      (double-entry pairs)
//!     ├── TransactionLifecycleManager      (initiate / settle)
//!     ├── Arc<SettlementQueue>             (fire-and-forget settlement)
//!     └── RecurringPaymentScheduler        (due cycles)
//! ```
//!
//! # Access control
//!
//! Every operation on behalf of a user takes the caller's owner id and fails
//! with `Unauthorized` unless the caller owns the account being read or
//! debited.

use super::account_store::InMemoryAccountStore;
use super::clearing::{ClearingSimulator, DelayedClearing};
use super::clock::SystemClock;
use super::history::PaymentHistoryRecorder;
use super::lifecycle::{LedgerHandles, TransactionLifecycleManager};
use super::recurring_store::RecurringPaymentStore;
use super::scheduler::{CycleSummary, RecurringPaymentScheduler};
use super::settlement_queue::{SettlementEvent, SettlementQueue};
use super::traits::{AccountStore, Clock};
use super::transaction_store::TransactionStore;
use crate::config::EngineConfig;
use crate::types::{
    Account, AccountId, NewAccount, NewRecurringPayment, OwnerId, PaymentError,
    PaymentHistoryEntry, RecurringPayment, RecurringPaymentId, RecurringPaymentUpdate,
    Transaction, TransactionId, TransactionRequest,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Builder for [`PaymentsEngine`]
///
/// Every collaborator has a production default; tests swap in a manual
/// clock, an instant or rejecting clearing simulator, or a custom store.
#[derive(Debug)]
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    clearing: Option<Arc<dyn ClearingSimulator>>,
    accounts: Option<Arc<dyn AccountStore>>,
}

impl EngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn clearing(mut self, clearing: Arc<dyn ClearingSimulator>) -> Self {
        self.clearing = Some(clearing);
        self
    }

    pub fn account_store(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Wire the engine and start its settlement queue
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> PaymentsEngine {
        let config = self.config.normalized();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let clearing = self
            .clearing
            .unwrap_or_else(|| Arc::new(DelayedClearing::new(config.settlement_delay)));
        let accounts = self
            .accounts
            .unwrap_or_else(|| Arc::new(InMemoryAccountStore::new()));

        let transactions = Arc::new(TransactionStore::new());
        let recurring = Arc::new(RecurringPaymentStore::new());
        let history = Arc::new(PaymentHistoryRecorder::new(Arc::clone(&clock)));

        let lifecycle = TransactionLifecycleManager::new(
            LedgerHandles {
                accounts: Arc::clone(&accounts),
                transactions: Arc::clone(&transactions),
                history: Arc::clone(&history),
                clearing,
                clock: Arc::clone(&clock),
            },
            config.max_conflict_retries,
        );
        let settlements = Arc::new(SettlementQueue::start(
            lifecycle.clone(),
            config.settlement_timeout,
            config.settlement_workers,
        ));
        let scheduler = RecurringPaymentScheduler::new(
            Arc::clone(&recurring),
            Arc::clone(&accounts),
            lifecycle.clone(),
            config.recurring_settlement_timeout,
            config.cycle_concurrency,
        );

        info!(
            settlement_workers = config.settlement_workers,
            cycle_concurrency = config.cycle_concurrency,
            "Payments engine started"
        );

        PaymentsEngine {
            accounts,
            transactions,
            recurring,
            history,
            lifecycle,
            settlements,
            scheduler,
            clock,
        }
    }
}

/// Payments ledger engine
///
/// Cloning is cheap and every clone drives the same ledger.
#[derive(Debug, Clone)]
pub struct PaymentsEngine {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<TransactionStore>,
    recurring: Arc<RecurringPaymentStore>,
    history: Arc<PaymentHistoryRecorder>,
    lifecycle: TransactionLifecycleManager,
    settlements: Arc<SettlementQueue>,
    scheduler: RecurringPaymentScheduler,
    clock: Arc<dyn Clock>,
}

impl PaymentsEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            clock: None,
            clearing: None,
            accounts: None,
        }
    }

    /// Engine with production defaults; must be called within a Tokio runtime
    pub fn new(config: EngineConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Open an account with a fresh id
    pub fn open_account(&self, account: NewAccount) -> Account {
        let account = self.accounts.create(account);
        info!(
            account_id = account.id,
            owner = account.owner,
            account_type = %account.account_type,
            "Account opened"
        );
        account
    }

    /// Load an existing account record under its own id
    pub fn import_account(&self, account: Account) {
        self.accounts.insert(account);
    }

    /// Load an existing recurring payment under its own id
    ///
    /// Seed data is trusted; use
    /// [`create_recurring_payment`](Self::create_recurring_payment) for user
    /// requests.
    pub fn import_recurring_payment(&self, payment: RecurringPayment) {
        self.recurring.insert(payment);
    }

    /// Start a transfer and return as soon as it is recorded
    ///
    /// # Arguments
    ///
    /// * `caller` - Owner of the sender account
    /// * `sender` - Account paying
    /// * `recipient` - Account receiving; a CREDIT/LOAN recipient is paid down
    /// * `amount` - Positive amount in `currency`
    /// * `remarks` - Free text stored on the transaction
    ///
    /// # Returns
    ///
    /// The id of a `PROCESSING` transaction. Settlement runs in the
    /// background; subscribe with
    /// [`subscribe_settlements`](Self::subscribe_settlements) to observe it.
    ///
    /// # Errors
    ///
    /// Caller errors (`AccountNotFound`, `Unauthorized`,
    /// `InsufficientBalance`, `Overpayment`, `CurrencyMismatch`,
    /// `InvalidAmount`) are returned before any record exists.
    pub fn initiate_transfer(
        &self,
        caller: OwnerId,
        sender: AccountId,
        recipient: AccountId,
        amount: Decimal,
        currency: &str,
        remarks: Option<String>,
    ) -> Result<TransactionId, PaymentError> {
        self.owned_account(caller, sender)?;
        self.submit(TransactionRequest::transfer(
            sender, recipient, amount, currency, remarks,
        ))
    }

    /// Start a withdrawal from a DEBIT account, in that account's currency
    ///
    /// # Errors
    ///
    /// `AccountNotFound`, `Unauthorized`, `InsufficientBalance`,
    /// `InvalidAccountType`, `InvalidAmount`; no record is created when any
    /// of them is returned.
    pub fn initiate_withdrawal(
        &self,
        caller: OwnerId,
        sender: AccountId,
        amount: Decimal,
    ) -> Result<TransactionId, PaymentError> {
        let account = self.owned_account(caller, sender)?;
        self.submit(TransactionRequest::withdrawal(
            sender,
            amount,
            account.currency,
        ))
    }

    fn submit(&self, request: TransactionRequest) -> Result<TransactionId, PaymentError> {
        let tx = self.lifecycle.initiate(request)?;

        if let Err(err) = self.settlements.enqueue(tx.id) {
            warn!(transaction_id = tx.id, error = %err, "Could not queue settlement");
            self.lifecycle.abandon(tx.id)?;
            return Err(err);
        }
        Ok(tx.id)
    }

    /// Create a recurring payment on behalf of `caller`
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - amount is not positive
    /// * `AccountNotFound` - sender or recipient does not exist
    /// * `Unauthorized` - `caller` does not own the sender account
    /// * `CurrencyMismatch` - currency differs from the sender's
    pub fn create_recurring_payment(
        &self,
        caller: OwnerId,
        payment: NewRecurringPayment,
    ) -> Result<RecurringPayment, PaymentError> {
        if payment.amount <= Decimal::ZERO {
            return Err(PaymentError::invalid_amount(payment.amount));
        }
        let sender = self.owned_account(caller, payment.sender)?;
        if self.accounts.find(payment.recipient).is_none() {
            return Err(PaymentError::account_not_found(payment.recipient));
        }
        if sender.currency != payment.currency {
            return Err(PaymentError::currency_mismatch(
                sender.id,
                &sender.currency,
                &payment.currency,
            ));
        }

        let payment = self.recurring.create(payment);
        info!(
            recurring_payment_id = payment.id,
            sender = payment.sender,
            recipient = payment.recipient,
            amount = %payment.amount,
            interval = %payment.interval,
            "Recurring payment created"
        );
        Ok(payment)
    }

    /// Edit a recurring payment on behalf of `caller`
    ///
    /// Pausing, resuming, disabling and canceling are status edits. The
    /// caller must own the current sender and, if it changes, the new one.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - new amount is not positive
    /// * `RecurringPaymentNotFound` - no payment with this id
    /// * `RecurringPaymentFinished` - the payment is completed or canceled
    /// * `Unauthorized` - `caller` does not own the sender account
    /// * `AccountNotFound` - a new sender or recipient does not exist
    /// * `CurrencyMismatch` - currency differs from the sender's
    pub fn update_recurring_payment(
        &self,
        caller: OwnerId,
        id: RecurringPaymentId,
        update: RecurringPaymentUpdate,
    ) -> Result<RecurringPayment, PaymentError> {
        if let Some(amount) = update.amount {
            if amount <= Decimal::ZERO {
                return Err(PaymentError::invalid_amount(amount));
            }
        }

        let updated = self.recurring.update(id, &update, |current, updated| {
            self.owned_account(caller, current.sender)?;
            let sender = self.owned_account(caller, updated.sender)?;
            if self.accounts.find(updated.recipient).is_none() {
                return Err(PaymentError::account_not_found(updated.recipient));
            }
            if sender.currency != updated.currency {
                return Err(PaymentError::currency_mismatch(
                    sender.id,
                    &sender.currency,
                    &updated.currency,
                ));
            }
            Ok(())
        })?;

        info!(
            recurring_payment_id = updated.id,
            status = %updated.status,
            amount = %updated.amount,
            next_payment_date = %updated.next_payment_date,
            "Recurring payment updated"
        );
        Ok(updated)
    }

    /// Process every recurring payment due at `now`
    pub async fn run_due_cycle(&self, now: DateTime<Utc>) -> CycleSummary {
        self.scheduler.run_due_cycle(now).await
    }

    /// Receive the outcome of every background settlement finished from now on
    pub fn subscribe_settlements(&self) -> broadcast::Receiver<SettlementEvent> {
        self.settlements.subscribe()
    }

    pub fn account(&self, caller: OwnerId, account_id: AccountId) -> Result<Account, PaymentError> {
        self.owned_account(caller, account_id)
    }

    pub fn accounts_for_owner(&self, owner: OwnerId) -> Vec<Account> {
        self.accounts.find_by_owner(owner)
    }

    /// Every account, ordered by id
    pub fn all_accounts(&self) -> Vec<Account> {
        self.accounts.all()
    }

    /// A transaction, visible to the owner of either side
    pub fn transaction(
        &self,
        caller: OwnerId,
        tx_id: TransactionId,
    ) -> Result<Transaction, PaymentError> {
        let tx = self
            .transactions
            .get(tx_id)
            .ok_or_else(|| PaymentError::transaction_not_found(tx_id))?;

        let owns_side = |id: AccountId| {
            self.accounts
                .find(id)
                .is_some_and(|account| account.owner == caller)
        };
        if owns_side(tx.sender) || tx.recipient.is_some_and(owns_side) {
            Ok(tx)
        } else {
            Err(PaymentError::unauthorized(tx.sender, caller))
        }
    }

    /// Transactions sent or received by `account_id`, oldest first
    pub fn transactions_for_account(
        &self,
        caller: OwnerId,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, PaymentError> {
        self.owned_account(caller, account_id)?;
        Ok(self.transactions.for_account(account_id))
    }

    /// History entries for `account_id`, newest first
    pub fn history_for_account(
        &self,
        caller: OwnerId,
        account_id: AccountId,
    ) -> Result<Vec<PaymentHistoryEntry>, PaymentError> {
        self.owned_account(caller, account_id)?;
        Ok(self.history.for_account(account_id))
    }

    pub fn recurring_payments_for_account(
        &self,
        caller: OwnerId,
        account_id: AccountId,
    ) -> Result<Vec<RecurringPayment>, PaymentError> {
        self.owned_account(caller, account_id)?;
        Ok(self.recurring.for_account(account_id))
    }

    /// Stop accepting transfers and wait for in-flight settlements
    pub async fn shutdown(&self) {
        self.settlements.shutdown().await;
    }

    fn owned_account(&self, caller: OwnerId, account_id: AccountId) -> Result<Account, PaymentError> {
        let account = self
            .accounts
            .find(account_id)
            .ok_or_else(|| PaymentError::account_not_found(account_id))?;
        if account.owner != caller {
            return Err(PaymentError::unauthorized(account_id, caller));
        }
        Ok(account)
    }
}
