//! Payments Ledger Library
//! # Overview
//!
//! This library provides the transaction-processing and recurring-payment
//! engine of a payments backend: it moves money between accounts through a
//! two-phase lifecycle and drives periodic payments to completion.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Transaction, RecurringPayment, etc.)
//! - [`config`] - Engine configuration and defaults
//! - [`core`] - Business logic components:
//!   - [`core::lifecycle`] - Transaction initiation and settlement
//!   - [`core::settlement_queue`] - Fire-and-forget background settlement
//!   - [`core::scheduler`] - Recurring payment due cycles
//!   - [`core::engine`] - Facade owning every store and component
//! - [`trigger`] - Periodic trigger that runs due cycles on a cadence
//! - [`io`] - Seed file loading and account output
//! - [`cli`] - CLI arguments parsing
//!
//! # Transaction Lifecycle
//!
//! ```text
//! initiate ──> PROCESSING ──clearing ok──> COMPLETED   (balances + history applied)
//!                   └────────rejected/timeout──> FAILED (nothing applied)
//! ```
//!
//! - **Transfer**: user-initiated, settled in the background
//! - **Withdrawal**: DEBIT accounts only, no recipient, no history pair
//! - **Payment**: created by the recurring scheduler, settled inline
//!
//! # Account Balances
//!
//! Each account maintains:
//! - `balance`: authoritative, changed only when a transaction completes
//! - `held`: funds reserved by `PROCESSING` transactions
//!
//! A payment into a DEBIT account increases its balance; a payment into a
//! CREDIT or LOAN account pays it down.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod trigger;
pub mod types;

pub use config::EngineConfig;
pub use core::{PaymentsEngine, SettlementEvent};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountId, AccountType, NewAccount, NewRecurringPayment, OwnerId, PaymentError,
    RecurringPayment, RecurringPaymentUpdate, RecurringStatus, Transaction, TransactionId,
    TransactionStatus, TransactionType,
};
