//! Scheduler: drives the reconciler on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use node_agent_core::SkipReason;

use crate::reconciler::Reconciler;

/// Runs reconciliation ticks until shutdown is signalled.
///
/// Each tick is awaited inside the loop, so ticks never overlap: a tick
/// that overruns the interval delays the next one rather than stacking
/// up behind it. The first tick fires one full interval after start.
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler using the reconciler's configured tick interval.
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        let interval = reconciler.config().tick_interval;
        Self {
            reconciler,
            interval,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the tick loop. Returns the number of ticks executed.
    ///
    /// Shutdown is observed between ticks; a tick already in progress is
    /// allowed to finish. A dropped sender counts as shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(interval_secs = self.interval.as_secs(), "watcher started");

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    ticks += 1;
                    self.tick(ticks).await;
                }
            }
        }

        info!(ticks, "watcher shutting down");
        ticks
    }

    async fn tick(&self, tick: u64) {
        debug!(tick, "started the watcher process");
        match self.reconciler.run_once().await {
            Ok(report) => debug!(
                tick,
                listed = report.listed,
                healthy = report.skipped(SkipReason::Healthy),
                cooling_down = report.skipped(SkipReason::CoolingDown),
                rebooted = report.rebooted().len(),
                "tick complete"
            ),
            Err(e) => error!(tick, error = %e, "an error occurred while running the watcher process"),
        }
    }
}
