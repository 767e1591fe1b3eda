use crate::config::EngineConfig;
use crate::io::parse_timestamp;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Run recurring payment cycles over a seeded ledger
#[derive(Parser, Debug)]
#[command(name = "payments-ledger")]
#[command(about = "Run recurring payment cycles over a seeded payments ledger", long_about = None)]
pub struct CliArgs {
    /// Account seed CSV
    #[arg(long = "accounts", value_name = "FILE")]
    pub accounts_file: PathBuf,

    /// Recurring payment seed CSV
    #[arg(long = "recurring", value_name = "FILE")]
    pub recurring_file: Option<PathBuf>,

    /// Pin the clock to this instant and step it by the cycle interval
    #[arg(
        long = "now",
        value_name = "RFC3339",
        value_parser = parse_now,
        help = "Simulated start time (RFC 3339 or YYYY-MM-DD); uses the system clock if absent"
    )]
    pub now: Option<DateTime<Utc>>,

    /// Number of due cycles to run before exiting
    #[arg(long = "cycles", value_name = "N", default_value_t = 1)]
    pub cycles: u64,

    #[arg(
        long = "settlement-delay-ms",
        env = "SETTLEMENT_DELAY_MS",
        value_name = "MS",
        help = "Simulated clearing delay (default: 30000)"
    )]
    pub settlement_delay_ms: Option<u64>,

    #[arg(
        long = "transaction-timeout-ms",
        env = "TRANSACTION_TIMEOUT_MS",
        value_name = "MS",
        help = "Bound on a background settlement (default: 60000)"
    )]
    pub transaction_timeout_ms: Option<u64>,

    #[arg(
        long = "recurring-timeout-ms",
        env = "RECURRING_PAYMENT_TIMEOUT_MS",
        value_name = "MS",
        help = "Bound on a recurring payment settlement (default: 60000)"
    )]
    pub recurring_timeout_ms: Option<u64>,

    #[arg(
        long = "settlement-workers",
        env = "SETTLEMENT_WORKERS",
        value_name = "COUNT",
        help = "Maximum concurrent background settlements (default: CPU cores)"
    )]
    pub settlement_workers: Option<usize>,

    #[arg(
        long = "cycle-concurrency",
        env = "CYCLE_CONCURRENCY",
        value_name = "COUNT",
        help = "Maximum due payments processed concurrently (default: CPU cores)"
    )]
    pub cycle_concurrency: Option<usize>,

    #[arg(
        long = "max-conflict-retries",
        env = "MAX_CONFLICT_RETRIES",
        value_name = "COUNT",
        help = "Retries after a concurrent-update conflict (default: 3)"
    )]
    pub max_conflict_retries: Option<u32>,

    #[arg(
        long = "cycle-interval-secs",
        env = "CYCLE_INTERVAL_SECS",
        value_name = "SECS",
        help = "Time between due cycles (default: 86400)"
    )]
    pub cycle_interval_secs: Option<u64>,
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(value)
}

impl CliArgs {
    /// Build an `EngineConfig`, filling unset options with defaults
    ///
    /// Zero values are replaced by defaults with a warning, as are timeouts
    /// too short to outlast the settlement delay.
    pub fn to_engine_config(&self) -> EngineConfig {
        let default = EngineConfig::default();

        EngineConfig {
            settlement_delay: self
                .settlement_delay_ms
                .map_or(default.settlement_delay, Duration::from_millis),
            settlement_timeout: self
                .transaction_timeout_ms
                .map_or(default.settlement_timeout, Duration::from_millis),
            recurring_settlement_timeout: self
                .recurring_timeout_ms
                .map_or(default.recurring_settlement_timeout, Duration::from_millis),
            settlement_workers: self
                .settlement_workers
                .unwrap_or(default.settlement_workers),
            cycle_concurrency: self.cycle_concurrency.unwrap_or(default.cycle_concurrency),
            max_conflict_retries: self
                .max_conflict_retries
                .unwrap_or(default.max_conflict_retries),
            cycle_interval: self
                .cycle_interval_secs
                .map_or(default.cycle_interval, Duration::from_secs),
        }
        .normalized()
    }
}
