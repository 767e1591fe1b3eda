//! Core business logic module
//!
//! This module contains the ledger components:
//! - `traits` - Seams for the account store and the clock
//! - `account_store` - In-memory account records with per-row locking
//! - `transaction_store` - Transaction records and the settlement claim
//! - `recurring_store` - Recurring payment schedules
//! - `history` - Double-entry payment history
//! - `verifier` - Read-only balance checks before a transaction exists
//! - `clearing` - Simulated external settlement
//! - `lifecycle` - Transaction initiation and settlement
//! - `settlement_queue` - Background settlement workers
//! - `scheduler` - Recurring payment due cycles
//! - `engine` - The facade wiring everything together

pub mod account_store;
pub mod clearing;
pub mod clock;
pub mod engine;
pub mod history;
pub mod lifecycle;
pub mod recurring_store;
pub mod scheduler;
pub mod settlement_queue;
pub mod traits;
pub mod transaction_store;
pub mod verifier;

pub use account_store::InMemoryAccountStore;
pub use clearing::{
    ClearingSimulator, DelayedClearing, InstantClearing, RejectingClearing, Rejection,
    SettlementDescriptor,
};
pub use clock::{ManualClock, SystemClock};
pub use engine::{EngineBuilder, PaymentsEngine};
pub use history::PaymentHistoryRecorder;
pub use lifecycle::{LedgerHandles, TransactionLifecycleManager};
pub use recurring_store::RecurringPaymentStore;
pub use scheduler::{CycleSummary, RecurringPaymentScheduler};
pub use settlement_queue::{SettlementEvent, SettlementQueue};
pub use traits::{AccountStore, Clock};
pub use transaction_store::TransactionStore;
pub use verifier::BalanceVerifier;
