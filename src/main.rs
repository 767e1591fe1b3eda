//! Payments ledger CLI
//!
//! Loads accounts and recurring payments from CSV, runs recurring payment
//! cycles and prints the final account table to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv --recurring recurring.csv > out.csv
//! cargo run -- --accounts accounts.csv --recurring recurring.csv --now 2026-01-01 --cycles 12
//! SETTLEMENT_DELAY_MS=0 cargo run -- --accounts accounts.csv --recurring recurring.csv
//! ```
//!
//! With `--now`, the clock is pinned to that instant and stepped forward by
//! the cycle interval after each cycle, so months of schedule run in
//! seconds. Without it, cycles run on the system clock at the configured
//! cadence.
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, runtime failure, etc.)

use chrono::TimeDelta;
use payments_ledger::cli::{self, CliArgs};
use payments_ledger::core::{Clock, ManualClock, PaymentsEngine};
use payments_ledger::io::{load_accounts, load_recurring_payments, write_accounts_csv};
use payments_ledger::trigger::run_periodic;
use payments_ledger::PaymentError;
use std::process;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create tokio runtime");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        error!(error = %e, "Fatal error");
        process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), PaymentError> {
    let config = args.to_engine_config();

    let mut builder = PaymentsEngine::builder(config.clone());
    let manual_clock = args.now.map(|now| Arc::new(ManualClock::new(now)));
    if let Some(clock) = &manual_clock {
        builder = builder.clock(clock.clone());
    }
    let engine = builder.build();

    for account in load_accounts(&args.accounts_file)? {
        engine.import_account(account);
    }
    if let Some(path) = &args.recurring_file {
        for payment in load_recurring_payments(path)? {
            engine.import_recurring_payment(payment);
        }
    }

    match manual_clock {
        Some(clock) => {
            let step = TimeDelta::from_std(config.cycle_interval)
                .map_err(|e| PaymentError::IoError {
                    message: format!("Cycle interval out of range: {}", e),
                })?;
            for _ in 0..args.cycles {
                engine.run_due_cycle(clock.now()).await;
                clock.advance(step);
            }
        }
        None => run_periodic(&engine, config.cycle_interval, Some(args.cycles)).await,
    }

    engine.shutdown().await;

    let mut output = std::io::stdout();
    write_accounts_csv(&engine.all_accounts(), &mut output)
}
