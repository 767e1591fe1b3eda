//! Background settlement queue
//!
//! The interactive path returns as soon as a transaction is recorded as
//! `PROCESSING`; settlement happens here, off the caller's task.
//!
//! # Architecture
//!
//! ```text
//! enqueue(tx_id) ──mpsc──> dispatcher ──spawn──> JoinSet (≤ workers, Semaphore)
//!                                                   │
//!                                                   └── SettlementEvent ──broadcast──> subscribers
//! ```
//!
//! `shutdown` stops accepting new ids, lets the dispatcher drain whatever is
//! already queued and waits for every in-flight settlement.

use super::lifecycle::TransactionLifecycleManager;
use crate::types::{PaymentError, TransactionId, TransactionStatus};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info};

const EVENT_CAPACITY: usize = 1024;

/// Outcome of one background settlement
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementEvent {
    pub transaction_id: TransactionId,

    /// Status of the transaction after the attempt
    pub status: TransactionStatus,

    /// Why the attempt did not complete the transaction, if it didn't
    pub error: Option<PaymentError>,
}

#[derive(Debug)]
pub struct SettlementQueue {
    sender: mpsc::UnboundedSender<TransactionId>,
    events: broadcast::Sender<SettlementEvent>,
    shutdown: Arc<Notify>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl SettlementQueue {
    /// Spawn the dispatcher on the current Tokio runtime
    ///
    /// At most `workers` settlements run at once, each bounded by `timeout`.
    pub fn start(manager: TransactionLifecycleManager, timeout: Duration, workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shutdown = Arc::new(Notify::new());

        let dispatcher = tokio::spawn(dispatch(
            manager,
            timeout,
            Arc::new(Semaphore::new(workers.max(1))),
            receiver,
            events.clone(),
            Arc::clone(&shutdown),
        ));

        Self {
            sender,
            events,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue `tx_id` for settlement
    ///
    /// Fails with `SettlementQueueClosed` once shutdown has begun.
    pub fn enqueue(&self, tx_id: TransactionId) -> Result<(), PaymentError> {
        self.sender
            .send(tx_id)
            .map_err(|_| PaymentError::settlement_queue_closed(tx_id))?;
        debug!(transaction_id = tx_id, "Settlement queued");
        Ok(())
    }

    /// Receive an event for every settlement finished after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.events.subscribe()
    }

    /// Stop accepting work and wait for queued and in-flight settlements
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(dispatcher) = dispatcher else {
            return;
        };

        self.shutdown.notify_one();
        if let Err(err) = dispatcher.await {
            error!(error = %err, "Settlement dispatcher panicked");
        }
        info!("Settlement queue drained");
    }
}

async fn dispatch(
    manager: TransactionLifecycleManager,
    timeout: Duration,
    permits: Arc<Semaphore>,
    mut receiver: mpsc::UnboundedReceiver<TransactionId>,
    events: broadcast::Sender<SettlementEvent>,
    shutdown: Arc<Notify>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            received = receiver.recv() => {
                // `None` only after `close()` once the buffer is empty
                let Some(tx_id) = received else { break };
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else { break };

                let manager = manager.clone();
                let events = events.clone();
                in_flight.spawn(async move {
                    let _permit = permit;
                    let event = settle_one(&manager, tx_id, timeout).await;
                    // No subscribers is not an error
                    let _ = events.send(event);
                });
            }
            () = shutdown.notified() => receiver.close(),
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => report_panic(joined),
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        report_panic(joined);
    }
}

async fn settle_one(
    manager: &TransactionLifecycleManager,
    tx_id: TransactionId,
    timeout: Duration,
) -> SettlementEvent {
    match manager.settle(tx_id, timeout).await {
        Ok(tx) => SettlementEvent {
            transaction_id: tx_id,
            status: tx.status,
            error: None,
        },
        Err(err) => SettlementEvent {
            transaction_id: tx_id,
            status: manager
                .transaction(tx_id)
                .map_or(TransactionStatus::Failed, |tx| tx.status),
            error: Some(err),
        },
    }
}

fn report_panic(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!(error = %err, "Settlement task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account_store::InMemoryAccountStore;
    use crate::core::clearing::{DelayedClearing, InstantClearing, ClearingSimulator};
    use crate::core::clock::SystemClock;
    use crate::core::history::PaymentHistoryRecorder;
    use crate::core::lifecycle::LedgerHandles;
    use crate::core::traits::AccountStore;
    use crate::core::transaction_store::TransactionStore;
    use crate::types::{AccountType, NewAccount, TransactionRequest};
    use rust_decimal::Decimal;

    fn manager(
        accounts: Arc<InMemoryAccountStore>,
        clearing: Arc<dyn ClearingSimulator>,
    ) -> TransactionLifecycleManager {
        let clock = Arc::new(SystemClock);
        TransactionLifecycleManager::new(
            LedgerHandles {
                accounts,
                transactions: Arc::new(TransactionStore::new()),
                history: Arc::new(PaymentHistoryRecorder::new(clock.clone())),
                clearing,
                clock,
            },
            3,
        )
    }

    #[tokio::test]
    async fn test_enqueued_transaction_settles_in_background() {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let sender = accounts.create(NewAccount::new(
            1,
            AccountType::Debit,
            Decimal::new(100, 0),
            "SGD",
        ));
        let manager = manager(accounts.clone(), Arc::new(InstantClearing));
        let queue = SettlementQueue::start(manager.clone(), Duration::from_secs(1), 2);
        let mut events = queue.subscribe();

        let tx = manager
            .initiate(TransactionRequest::withdrawal(sender.id, Decimal::new(50, 0), "SGD"))
            .unwrap();
        queue.enqueue(tx.id).unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.transaction_id, tx.id);
        assert_eq!(event.status, TransactionStatus::Completed);
        assert_eq!(event.error, None);
        assert_eq!(accounts.find(sender.id).unwrap().balance, Decimal::new(50, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_as_failed() {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let sender = accounts.create(NewAccount::new(
            1,
            AccountType::Debit,
            Decimal::new(100, 0),
            "SGD",
        ));
        let manager = manager(
            accounts.clone(),
            Arc::new(DelayedClearing::new(Duration::from_secs(30))),
        );
        let queue = SettlementQueue::start(manager.clone(), Duration::from_secs(1), 1);
        let mut events = queue.subscribe();

        let tx = manager
            .initiate(TransactionRequest::withdrawal(sender.id, Decimal::new(50, 0), "SGD"))
            .unwrap();
        queue.enqueue(tx.id).unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.status, TransactionStatus::Failed);
        assert_eq!(
            event.error,
            Some(PaymentError::settlement_timeout(tx.id, 1000))
        );
        let account = accounts.find(sender.id).unwrap();
        assert_eq!(account.balance, Decimal::new(100, 0));
        assert_eq!(account.held, Decimal::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_and_closes() {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let sender = accounts.create(NewAccount::new(
            1,
            AccountType::Debit,
            Decimal::new(100, 0),
            "SGD",
        ));
        let manager = manager(
            accounts.clone(),
            Arc::new(DelayedClearing::new(Duration::from_secs(30))),
        );
        let queue = SettlementQueue::start(manager.clone(), Duration::from_secs(60), 1);

        let mut ids = Vec::new();
        for _ in 0..3 {
            let tx = manager
                .initiate(TransactionRequest::withdrawal(sender.id, Decimal::new(10, 0), "SGD"))
                .unwrap();
            queue.enqueue(tx.id).unwrap();
            ids.push(tx.id);
        }

        queue.shutdown().await;

        for id in ids {
            assert_eq!(
                manager.transaction(id).unwrap().status,
                TransactionStatus::Completed
            );
        }
        assert_eq!(accounts.find(sender.id).unwrap().balance, Decimal::new(70, 0));
        assert_eq!(
            queue.enqueue(99),
            Err(PaymentError::settlement_queue_closed(99))
        );
        queue.shutdown().await;
    }
}
