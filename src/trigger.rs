//! Periodic trigger for the recurring payment scheduler

use crate::core::PaymentsEngine;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Run a due cycle every `cadence`, starting immediately
///
/// Each cycle uses the engine clock's current time. Stops after `cycles`
/// cycles, or never when `cycles` is `None`.
pub async fn run_periodic(engine: &PaymentsEngine, cadence: Duration, cycles: Option<u64>) {
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let clock = engine.clock();

    let mut completed = 0u64;
    while cycles.map_or(true, |limit| completed < limit) {
        ticker.tick().await;
        let summary = engine.run_due_cycle(clock.now()).await;
        completed += 1;
        info!(
            cycle = completed,
            processed = summary.processed,
            paused = summary.paused,
            "Periodic cycle done"
        );
    }
}
