//! Engine configuration
//!
//! `EngineConfig` carries every tunable of the payments engine. Values come
//! from the CLI (flags or environment variables) or are built directly by
//! library users; zero values fall back to the defaults, and a settlement
//! timeout that could never outlast the clearing delay is raised.

use std::time::Duration;
use tracing::warn;

/// Default simulated clearing delay
pub const DEFAULT_SETTLEMENT_DELAY: Duration = Duration::from_secs(30);

/// Default bound on one settlement, interactive or scheduled
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default cadence of the periodic trigger: once daily
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long the clearing simulator waits before acknowledging
    pub settlement_delay: Duration,

    /// Bound on a background settlement started by a transfer or withdrawal
    pub settlement_timeout: Duration,

    /// Bound on a settlement awaited by the recurring scheduler
    pub recurring_settlement_timeout: Duration,

    /// Maximum number of background settlements running at once
    pub settlement_workers: usize,

    /// Maximum number of due payments processed at once in one cycle
    pub cycle_concurrency: usize,

    /// Extra attempts after a concurrent-update conflict
    pub max_conflict_retries: u32,

    /// How often the periodic trigger runs a due cycle
    pub cycle_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settlement_delay: DEFAULT_SETTLEMENT_DELAY,
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
            recurring_settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
            settlement_workers: num_cpus::get(),
            cycle_concurrency: num_cpus::get(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Replace zero durations and counts with their defaults
    ///
    /// A zero settlement delay is kept: it means "acknowledge immediately".
    /// A zero retry count is kept too: it disables retries.
    ///
    /// Both settlement timeouts must exceed a non-zero settlement delay,
    /// otherwise every settlement would time out. Such a timeout is raised
    /// to the larger of its default and twice the delay.
    pub fn normalized(self) -> Self {
        let default = Self::default();
        let delay = self.settlement_delay;

        Self {
            settlement_delay: delay,
            settlement_timeout: outlasting(
                "settlement_timeout",
                non_zero_duration(
                    "settlement_timeout",
                    self.settlement_timeout,
                    default.settlement_timeout,
                ),
                delay,
                default.settlement_timeout,
            ),
            recurring_settlement_timeout: outlasting(
                "recurring_settlement_timeout",
                non_zero_duration(
                    "recurring_settlement_timeout",
                    self.recurring_settlement_timeout,
                    default.recurring_settlement_timeout,
                ),
                delay,
                default.recurring_settlement_timeout,
            ),
            settlement_workers: non_zero_count(
                "settlement_workers",
                self.settlement_workers,
                default.settlement_workers,
            ),
            cycle_concurrency: non_zero_count(
                "cycle_concurrency",
                self.cycle_concurrency,
                default.cycle_concurrency,
            ),
            max_conflict_retries: self.max_conflict_retries,
            cycle_interval: non_zero_duration(
                "cycle_interval",
                self.cycle_interval,
                default.cycle_interval,
            ),
        }
    }
}

fn non_zero_duration(name: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        warn!(
            setting = name,
            default_ms = default.as_millis() as u64,
            "Invalid zero value, using default"
        );
        default
    } else {
        value
    }
}

fn outlasting(name: &str, timeout: Duration, delay: Duration, default: Duration) -> Duration {
    if delay.is_zero() || timeout > delay {
        return timeout;
    }
    let raised = default.max(delay.saturating_mul(2));
    warn!(
        setting = name,
        timeout_ms = timeout.as_millis() as u64,
        settlement_delay_ms = delay.as_millis() as u64,
        raised_ms = raised.as_millis() as u64,
        "Settlement timeout does not exceed the clearing delay, raising it"
    );
    raised
}

fn non_zero_count(name: &str, value: usize, default: usize) -> usize {
    if value == 0 {
        warn!(setting = name, default, "Invalid zero value, using default");
        default
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.settlement_delay, Duration::from_secs(30));
        assert_eq!(config.settlement_timeout, Duration::from_secs(60));
        assert_eq!(config.recurring_settlement_timeout, Duration::from_secs(60));
        assert_eq!(config.settlement_workers, num_cpus::get());
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.cycle_interval, Duration::from_secs(86_400));
    }

    #[rstest]
    #[case::workers(EngineConfig { settlement_workers: 0, ..EngineConfig::default() })]
    #[case::concurrency(EngineConfig { cycle_concurrency: 0, ..EngineConfig::default() })]
    #[case::timeout(EngineConfig { settlement_timeout: Duration::ZERO, ..EngineConfig::default() })]
    #[case::recurring_timeout(EngineConfig { recurring_settlement_timeout: Duration::ZERO, ..EngineConfig::default() })]
    #[case::cadence(EngineConfig { cycle_interval: Duration::ZERO, ..EngineConfig::default() })]
    fn test_zero_falls_back_to_default(#[case] config: EngineConfig) {
        assert_eq!(config.normalized(), EngineConfig::default());
    }

    #[rstest]
    #[case::shorter_than_delay(30_000, 10_000, 60_000)]
    #[case::equal_to_delay(30_000, 30_000, 60_000)]
    #[case::delay_above_default(90_000, 60_000, 180_000)]
    #[case::outlasts_delay(30_000, 45_000, 45_000)]
    #[case::instant_clearing(0, 10, 10)]
    fn test_timeout_must_outlast_delay(
        #[case] delay_ms: u64,
        #[case] timeout_ms: u64,
        #[case] expected_ms: u64,
    ) {
        let config = EngineConfig {
            settlement_delay: Duration::from_millis(delay_ms),
            settlement_timeout: Duration::from_millis(timeout_ms),
            recurring_settlement_timeout: Duration::from_millis(timeout_ms),
            ..EngineConfig::default()
        }
        .normalized();

        assert_eq!(config.settlement_timeout, Duration::from_millis(expected_ms));
        assert_eq!(
            config.recurring_settlement_timeout,
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn test_zero_delay_and_retries_are_kept() {
        let config = EngineConfig {
            settlement_delay: Duration::ZERO,
            max_conflict_retries: 0,
            ..EngineConfig::default()
        };

        let normalized = config.clone().normalized();

        assert_eq!(normalized, config);
    }
}
