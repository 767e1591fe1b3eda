//! Recurring payment scheduler
//!
//! This module provides `RecurringPaymentScheduler`, which drives every due
//! recurring payment through one settlement and then reschedules or
//! quarantines it.
//!
//! # Per-payment cycle
//!
//! ```text
//! next date = now + interval
//! instalment = amount, capped at what a CREDIT/LOAN recipient still owes
//! verify sender -> initiate PAYMENT -> settle (awaited)
//!     ok:  recipient balance == 0 ? (future end date ? PAUSED : COMPLETED) : ACTIVE
//!     err: PAUSED, date unchanged
//! ```
//!
//! A recipient that owes nothing is not paid again; the schedule moves
//! straight to its next status.
//!
//! Payments in one cycle are processed concurrently up to a fixed limit.
//! A failing payment never aborts the cycle or touches another payment.

use super::lifecycle::TransactionLifecycleManager;
use super::recurring_store::RecurringPaymentStore;
use super::traits::AccountStore;
use super::verifier::BalanceVerifier;
use crate::types::{
    Account, PaymentError, RecurringPayment, RecurringStatus, TransactionRequest,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Counts reported at the end of a due cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub processed: usize,
    pub paused: usize,
}

#[derive(Debug, Clone)]
pub struct RecurringPaymentScheduler {
    payments: Arc<RecurringPaymentStore>,
    accounts: Arc<dyn AccountStore>,
    lifecycle: TransactionLifecycleManager,
    verifier: BalanceVerifier,
    settlement_timeout: Duration,
    concurrency: usize,
}

impl RecurringPaymentScheduler {
    pub fn new(
        payments: Arc<RecurringPaymentStore>,
        accounts: Arc<dyn AccountStore>,
        lifecycle: TransactionLifecycleManager,
        settlement_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            payments,
            verifier: BalanceVerifier::new(Arc::clone(&accounts)),
            accounts,
            lifecycle,
            settlement_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Process every recurring payment due at `now`
    ///
    /// Never fails: each payment's error is absorbed by pausing it.
    pub async fn run_due_cycle(&self, now: DateTime<Utc>) -> CycleSummary {
        let due = self.payments.due(now);
        if due.is_empty() {
            debug!(%now, "No recurring payments due");
            return CycleSummary::default();
        }
        info!(%now, due = due.len(), "Running recurring payment cycle");

        let outcomes: Vec<bool> = stream::iter(due)
            .map(|payment| self.process(payment, now))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let summary = CycleSummary {
            processed: outcomes.iter().filter(|ok| **ok).count(),
            paused: outcomes.iter().filter(|ok| !**ok).count(),
        };
        info!(
            processed = summary.processed,
            paused = summary.paused,
            "Recurring payment cycle finished"
        );
        summary
    }

    async fn process(&self, payment: RecurringPayment, now: DateTime<Utc>) -> bool {
        match self.advance(&payment, now).await {
            Ok(updated) => {
                info!(
                    recurring_payment_id = payment.id,
                    status = %updated.status,
                    next_payment_date = %updated.next_payment_date,
                    "Recurring payment processed"
                );
                true
            }
            Err(err) => {
                warn!(
                    recurring_payment_id = payment.id,
                    error = %err,
                    "Recurring payment failed, pausing"
                );
                if let Err(pause_err) = self.payments.pause(payment.id) {
                    error!(
                        recurring_payment_id = payment.id,
                        error = %pause_err,
                        "Failed to pause recurring payment"
                    );
                }
                false
            }
        }
    }

    async fn advance(
        &self,
        payment: &RecurringPayment,
        now: DateTime<Utc>,
    ) -> Result<RecurringPayment, PaymentError> {
        // Fails before any money moves if the interval overflows
        let next_payment_date = payment.interval.advance(now)?;

        let owed = self.recipient(payment)?;
        let amount = instalment(payment.amount, &owed);
        if amount.is_zero() {
            return self
                .payments
                .reschedule(payment.id, next_payment_date, next_status(&owed, now));
        }

        self.verifier.verify(payment.sender, amount)?;
        let tx = self.lifecycle.initiate(TransactionRequest::recurring_payment(
            payment.sender,
            payment.recipient,
            amount,
            payment.currency.clone(),
        ))?;
        self.lifecycle.settle(tx.id, self.settlement_timeout).await?;

        let recipient = self.recipient(payment)?;
        self.payments
            .reschedule(payment.id, next_payment_date, next_status(&recipient, now))
    }

    fn recipient(&self, payment: &RecurringPayment) -> Result<Account, PaymentError> {
        self.accounts
            .find(payment.recipient)
            .ok_or_else(|| PaymentError::account_not_found(payment.recipient))
    }
}

/// Amount to pay this cycle
///
/// A CREDIT/LOAN recipient is never paid more than it owes, so the last
/// instalment of a loan may be smaller than the scheduled amount.
pub fn instalment(scheduled: Decimal, recipient: &Account) -> Decimal {
    if recipient.account_type.is_asset() {
        scheduled
    } else {
        scheduled.min(recipient.balance.max(Decimal::ZERO))
    }
}

/// Status after a successful cycle, from the recipient's balance
///
/// A paid-off recipient ends the schedule unless its end date is still ahead.
pub fn next_status(recipient: &Account, now: DateTime<Utc>) -> RecurringStatus {
    if !recipient.balance.is_zero() {
        RecurringStatus::Active
    } else if recipient.ends_after(now) {
        RecurringStatus::Paused
    } else {
        RecurringStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account_store::InMemoryAccountStore;
    use crate::core::clearing::{ClearingSimulator, InstantClearing, RejectingClearing};
    use crate::core::clock::ManualClock;
    use crate::core::history::PaymentHistoryRecorder;
    use crate::core::lifecycle::LedgerHandles;
    use crate::core::transaction_store::TransactionStore;
    use crate::types::{
        AccountId, AccountType, Interval, IntervalUnit, NewAccount, NewRecurringPayment,
        TransactionStatus, TransactionType,
    };
    use chrono::{TimeDelta, TimeZone};
    use rstest::rstest;

    struct Fixture {
        scheduler: RecurringPaymentScheduler,
        accounts: Arc<InMemoryAccountStore>,
        payments: Arc<RecurringPaymentStore>,
        transactions: Arc<TransactionStore>,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()
    }

    fn fixture(clearing: Arc<dyn ClearingSimulator>) -> Fixture {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let payments = Arc::new(RecurringPaymentStore::new());
        let transactions = Arc::new(TransactionStore::new());
        let clock = Arc::new(ManualClock::new(now()));
        let lifecycle = TransactionLifecycleManager::new(
            LedgerHandles {
                accounts: accounts.clone(),
                transactions: Arc::clone(&transactions),
                history: Arc::new(PaymentHistoryRecorder::new(clock.clone())),
                clearing,
                clock,
            },
            3,
        );
        let scheduler = RecurringPaymentScheduler::new(
            Arc::clone(&payments),
            accounts.clone(),
            lifecycle,
            Duration::from_secs(5),
            4,
        );
        Fixture {
            scheduler,
            accounts,
            payments,
            transactions,
        }
    }

    fn open(f: &Fixture, account: NewAccount) -> AccountId {
        f.accounts.create(account).id
    }

    fn schedule(f: &Fixture, sender: AccountId, recipient: AccountId, amount: i64) -> RecurringPayment {
        f.payments.create(NewRecurringPayment::new(
            sender,
            recipient,
            Decimal::new(amount, 0),
            "SGD",
            Interval::new(1, IntervalUnit::Month).unwrap(),
            now() - TimeDelta::days(1),
        ))
    }

    #[tokio::test]
    async fn test_due_payment_is_settled_and_advanced() {
        let f = fixture(Arc::new(InstantClearing));
        let sender = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(500, 0), "SGD"));
        let recipient = open(&f, NewAccount::new(2, AccountType::Debit, Decimal::ZERO, "SGD"));
        let payment = schedule(&f, sender, recipient, 100);

        let summary = f.scheduler.run_due_cycle(now()).await;

        assert_eq!(summary, CycleSummary { processed: 1, paused: 0 });
        let updated = f.payments.get(payment.id).unwrap();
        assert_eq!(updated.status, RecurringStatus::Active);
        assert_eq!(updated.next_payment_date, now() + TimeDelta::days(30));
        assert_eq!(f.accounts.find(sender).unwrap().balance, Decimal::new(400, 0));
        assert_eq!(f.accounts.find(recipient).unwrap().balance, Decimal::new(100, 0));

        let txs = f.transactions.for_account(sender);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].tx_type, TransactionType::Payment);
        assert_eq!(txs[0].status, TransactionStatus::Completed);
        assert_eq!(txs[0].remarks.as_deref(), Some("RECURRING PAYMENT"));
    }

    #[tokio::test]
    async fn test_rejected_settlement_pauses_without_moving_date() {
        let f = fixture(Arc::new(RejectingClearing::default()));
        let sender = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(500, 0), "SGD"));
        let recipient = open(&f, NewAccount::new(2, AccountType::Debit, Decimal::ZERO, "SGD"));
        let payment = schedule(&f, sender, recipient, 100);

        let summary = f.scheduler.run_due_cycle(now()).await;

        assert_eq!(summary, CycleSummary { processed: 0, paused: 1 });
        let updated = f.payments.get(payment.id).unwrap();
        assert_eq!(updated.status, RecurringStatus::Paused);
        assert_eq!(updated.next_payment_date, payment.next_payment_date);
        assert_eq!(f.accounts.find(sender).unwrap().balance, Decimal::new(500, 0));
        assert_eq!(f.accounts.find(sender).unwrap().held, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_cycle() {
        let f = fixture(Arc::new(InstantClearing));
        let poor = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(5, 0), "SGD"));
        let rich = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(500, 0), "SGD"));
        let recipient = open(&f, NewAccount::new(2, AccountType::Debit, Decimal::ZERO, "SGD"));
        let failing = schedule(&f, poor, recipient, 100);
        let ok = schedule(&f, rich, recipient, 100);

        f.scheduler.run_due_cycle(now()).await;

        assert_eq!(f.payments.get(failing.id).unwrap().status, RecurringStatus::Paused);
        assert_eq!(f.payments.get(ok.id).unwrap().status, RecurringStatus::Active);
        assert_eq!(f.accounts.find(recipient).unwrap().balance, Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn test_paying_off_loan_completes_schedule() {
        let f = fixture(Arc::new(InstantClearing));
        let sender = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(500, 0), "SGD"));
        let loan = open(&f, NewAccount::new(1, AccountType::Loan, Decimal::new(100, 0), "SGD"));
        let payment = schedule(&f, sender, loan, 100);

        f.scheduler.run_due_cycle(now()).await;

        assert_eq!(f.accounts.find(loan).unwrap().balance, Decimal::ZERO);
        assert_eq!(
            f.payments.get(payment.id).unwrap().status,
            RecurringStatus::Completed
        );
        // Completed is absorbing: later cycles do nothing
        let later = now() + TimeDelta::days(60);
        assert_eq!(f.scheduler.run_due_cycle(later).await, CycleSummary::default());
    }

    #[tokio::test]
    async fn test_final_instalment_is_capped_at_loan_balance() {
        let f = fixture(Arc::new(InstantClearing));
        let sender = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(500, 0), "SGD"));
        let loan = open(&f, NewAccount::new(1, AccountType::Loan, Decimal::new(30, 0), "SGD"));
        let payment = schedule(&f, sender, loan, 100);

        let summary = f.scheduler.run_due_cycle(now()).await;

        assert_eq!(summary, CycleSummary { processed: 1, paused: 0 });
        assert_eq!(f.accounts.find(loan).unwrap().balance, Decimal::ZERO);
        assert_eq!(f.accounts.find(sender).unwrap().balance, Decimal::new(470, 0));
        assert_eq!(
            f.payments.get(payment.id).unwrap().status,
            RecurringStatus::Completed
        );
        let txs = f.transactions.for_account(sender);
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, Decimal::new(30, 0));
    }

    #[tokio::test]
    async fn test_paid_off_recipient_is_not_paid_again() {
        let f = fixture(Arc::new(InstantClearing));
        let sender = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(500, 0), "SGD"));
        let loan = open(&f, NewAccount::new(1, AccountType::Loan, Decimal::ZERO, "SGD"));
        let payment = schedule(&f, sender, loan, 100);

        let summary = f.scheduler.run_due_cycle(now()).await;

        assert_eq!(summary, CycleSummary { processed: 1, paused: 0 });
        assert_eq!(
            f.payments.get(payment.id).unwrap().status,
            RecurringStatus::Completed
        );
        assert!(f.transactions.is_empty());
        assert_eq!(f.accounts.find(sender).unwrap().balance, Decimal::new(500, 0));
    }

    #[rstest]
    #[case::debit_takes_full_amount(AccountType::Debit, 10, 100)]
    #[case::loan_owes_more(AccountType::Loan, 250, 100)]
    #[case::loan_owes_less(AccountType::Loan, 30, 30)]
    #[case::credit_paid_off(AccountType::Credit, 0, 0)]
    fn test_instalment(
        #[case] account_type: AccountType,
        #[case] balance: i64,
        #[case] expected: i64,
    ) {
        let recipient = NewAccount::new(1, account_type, Decimal::new(balance, 0), "SGD")
            .into_account(1);

        assert_eq!(
            instalment(Decimal::new(100, 0), &recipient),
            Decimal::new(expected, 0)
        );
    }

    #[tokio::test]
    async fn test_nothing_due() {
        let f = fixture(Arc::new(InstantClearing));
        let sender = open(&f, NewAccount::new(1, AccountType::Debit, Decimal::new(500, 0), "SGD"));
        let recipient = open(&f, NewAccount::new(2, AccountType::Debit, Decimal::ZERO, "SGD"));
        let payment = schedule(&f, sender, recipient, 100);

        let summary = f
            .scheduler
            .run_due_cycle(payment.next_payment_date - TimeDelta::seconds(1))
            .await;

        assert_eq!(summary, CycleSummary::default());
        assert!(f.transactions.is_empty());
    }

    #[rstest]
    #[case::outstanding(50, None, RecurringStatus::Active)]
    #[case::paid_off(0, None, RecurringStatus::Completed)]
    #[case::paid_off_before_end(0, Some(10), RecurringStatus::Paused)]
    #[case::paid_off_after_end(0, Some(-10), RecurringStatus::Completed)]
    fn test_next_status(
        #[case] balance: i64,
        #[case] end_in_days: Option<i64>,
        #[case] expected: RecurringStatus,
    ) {
        let mut account =
            NewAccount::new(1, AccountType::Loan, Decimal::new(balance, 0), "SGD");
        if let Some(days) = end_in_days {
            account = account.with_end_date(now() + TimeDelta::days(days));
        }

        assert_eq!(next_status(&account.into_account(1), now()), expected);
    }
}
