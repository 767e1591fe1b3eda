//! Thread-safe recurring payment storage
//!
//! Holds recurring payment records in a `DashMap`. The scheduler moves a
//! record's status or date through
//! [`reschedule`](RecurringPaymentStore::reschedule) and
//! [`pause`](RecurringPaymentStore::pause); owners edit it through
//! [`update`](RecurringPaymentStore::update). None of them changes a record
//! in an absorbing state.

use crate::types::{
    AccountId, NewRecurringPayment, PaymentError, RecurringPayment, RecurringPaymentId,
    RecurringPaymentUpdate, RecurringStatus,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct RecurringPaymentStore {
    payments: DashMap<RecurringPaymentId, RecurringPayment>,
    next_id: AtomicU64,
}

impl RecurringPaymentStore {
    pub fn new() -> Self {
        Self {
            payments: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn create(&self, payment: NewRecurringPayment) -> RecurringPayment {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let payment = payment.into_payment(id);
        self.payments.insert(id, payment.clone());
        payment
    }

    /// Store a payment under its own id, replacing any existing record
    pub fn insert(&self, payment: RecurringPayment) {
        self.next_id.fetch_max(payment.id + 1, Ordering::SeqCst);
        self.payments.insert(payment.id, payment);
    }

    pub fn get(&self, id: RecurringPaymentId) -> Option<RecurringPayment> {
        self.payments.get(&id).map(|entry| entry.value().clone())
    }

    /// Active payments scheduled at or before `now`, earliest first
    pub fn due(&self, now: DateTime<Utc>) -> Vec<RecurringPayment> {
        let mut due: Vec<RecurringPayment> = self
            .payments
            .iter()
            .filter(|entry| entry.value().is_due(now))
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by_key(|payment| (payment.next_payment_date, payment.id));
        due
    }

    /// Payments sent or received by `account`
    pub fn for_account(&self, account: AccountId) -> Vec<RecurringPayment> {
        let mut payments: Vec<RecurringPayment> = self
            .payments
            .iter()
            .filter(|entry| {
                let payment = entry.value();
                payment.sender == account || payment.recipient == account
            })
            .map(|entry| entry.value().clone())
            .collect();
        payments.sort_by_key(|payment| payment.id);
        payments
    }

    pub fn all(&self) -> Vec<RecurringPayment> {
        let mut payments: Vec<RecurringPayment> = self
            .payments
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        payments.sort_by_key(|payment| payment.id);
        payments
    }

    /// Record a completed cycle: move the date forward and set the status
    ///
    /// The date never moves backwards. Terminal records are returned as-is.
    pub fn reschedule(
        &self,
        id: RecurringPaymentId,
        next_payment_date: DateTime<Utc>,
        status: RecurringStatus,
    ) -> Result<RecurringPayment, PaymentError> {
        let mut entry = self
            .payments
            .get_mut(&id)
            .ok_or_else(|| PaymentError::recurring_payment_not_found(id))?;
        let payment = entry.value_mut();

        if !payment.status.is_terminal() {
            if next_payment_date > payment.next_payment_date {
                payment.next_payment_date = next_payment_date;
            }
            payment.status = status;
        }
        Ok(payment.clone())
    }

    /// Apply an owner's edit under the entry lock
    ///
    /// `check` sees the current and the edited record and may veto the
    /// edit; nothing is written when it fails. Completed and canceled
    /// records are refused with `RecurringPaymentFinished`.
    pub fn update<F>(
        &self,
        id: RecurringPaymentId,
        update: &RecurringPaymentUpdate,
        check: F,
    ) -> Result<RecurringPayment, PaymentError>
    where
        F: FnOnce(&RecurringPayment, &RecurringPayment) -> Result<(), PaymentError>,
    {
        let mut entry = self
            .payments
            .get_mut(&id)
            .ok_or_else(|| PaymentError::recurring_payment_not_found(id))?;
        let current = entry.value_mut();

        if current.status.is_terminal() {
            return Err(PaymentError::recurring_payment_finished(id, current.status));
        }
        let updated = update.applied_to(current);
        check(current, &updated)?;

        *current = updated;
        Ok(current.clone())
    }

    /// Quarantine a failing payment, leaving its date unchanged
    pub fn pause(&self, id: RecurringPaymentId) -> Result<RecurringPayment, PaymentError> {
        let mut entry = self
            .payments
            .get_mut(&id)
            .ok_or_else(|| PaymentError::recurring_payment_not_found(id))?;
        let payment = entry.value_mut();

        if !payment.status.is_terminal() {
            payment.status = RecurringStatus::Paused;
        }
        Ok(payment.clone())
    }
}

impl Default for RecurringPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}
