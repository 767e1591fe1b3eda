//! Clearing simulator
//!
//! The boundary between the ledger and whatever confirms a payment
//! externally. The reference implementation waits a fixed delay and then
//! acknowledges; tests inject [`InstantClearing`] or [`RejectingClearing`].

use crate::types::{AccountId, PaymentError, Transaction, TransactionId, TransactionType};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt::Debug;
use std::time::Duration;
use tracing::info;

/// What the clearing side sees of a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementDescriptor {
    pub transaction_id: TransactionId,
    pub tx_type: TransactionType,
    pub sender: AccountId,
    pub recipient: Option<AccountId>,
    pub amount: Decimal,
    pub currency: String,
}

impl From<&Transaction> for SettlementDescriptor {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            tx_type: tx.tx_type,
            sender: tx.sender,
            recipient: tx.recipient,
            amount: tx.amount,
            currency: tx.currency.clone(),
        }
    }
}

/// Negative acknowledgement from the clearing side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait ClearingSimulator: Send + Sync + Debug {
    /// Resolve once the transaction is acknowledged or rejected
    async fn settle(&self, descriptor: &SettlementDescriptor) -> Result<(), Rejection>;
}

/// Run `clearing` for `descriptor`, bounded by `timeout`
///
/// A timeout is reported exactly like a rejection would be: the caller
/// fails the transaction and applies nothing.
pub async fn settle_with_timeout(
    clearing: &dyn ClearingSimulator,
    descriptor: &SettlementDescriptor,
    timeout: Duration,
) -> Result<(), PaymentError> {
    let tx = descriptor.transaction_id;
    match tokio::time::timeout(timeout, clearing.settle(descriptor)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(rejection)) => Err(PaymentError::settlement_rejected(tx, &rejection.reason)),
        Err(_) => Err(PaymentError::settlement_timeout(
            tx,
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}

/// Acknowledges every transaction after a fixed delay
#[derive(Debug, Clone)]
pub struct DelayedClearing {
    delay: Duration,
}

impl DelayedClearing {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ClearingSimulator for DelayedClearing {
    async fn settle(&self, descriptor: &SettlementDescriptor) -> Result<(), Rejection> {
        info!(
            transaction_id = descriptor.transaction_id,
            tx_type = %descriptor.tx_type,
            sender = descriptor.sender,
            recipient = ?descriptor.recipient,
            "Clearing started"
        );
        tokio::time::sleep(self.delay).await;
        info!(transaction_id = descriptor.transaction_id, "Clearing acknowledged");
        Ok(())
    }
}

/// Acknowledges immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantClearing;

#[async_trait]
impl ClearingSimulator for InstantClearing {
    async fn settle(&self, _descriptor: &SettlementDescriptor) -> Result<(), Rejection> {
        Ok(())
    }
}

/// Rejects every transaction
#[derive(Debug, Clone)]
pub struct RejectingClearing {
    reason: String,
}

impl RejectingClearing {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for RejectingClearing {
    fn default() -> Self {
        Self::new("declined by clearing")
    }
}

#[async_trait]
impl ClearingSimulator for RejectingClearing {
    async fn settle(&self, _descriptor: &SettlementDescriptor) -> Result<(), Rejection> {
        Err(Rejection::new(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> SettlementDescriptor {
        SettlementDescriptor {
            transaction_id: 3,
            tx_type: TransactionType::Transfer,
            sender: 1,
            recipient: Some(2),
            amount: Decimal::new(10, 0),
            currency: "SGD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_instant_clearing_acks() {
        let result =
            settle_with_timeout(&InstantClearing, &descriptor(), Duration::from_secs(1)).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_rejecting_clearing() {
        let clearing = RejectingClearing::new("card blocked");
        let result = settle_with_timeout(&clearing, &descriptor(), Duration::from_secs(1)).await;
        assert_eq!(result, Err(PaymentError::settlement_rejected(3, "card blocked")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_clearing_within_timeout() {
        let clearing = DelayedClearing::new(Duration::from_secs(30));
        let result = settle_with_timeout(&clearing, &descriptor(), Duration::from_secs(60)).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_clearing_times_out() {
        let clearing = DelayedClearing::new(Duration::from_secs(30));
        let result = settle_with_timeout(&clearing, &descriptor(), Duration::from_secs(5)).await;
        assert_eq!(result, Err(PaymentError::settlement_timeout(3, 5000)));
    }
}
