//! # Tick Driver
//!
//! Drives an [`EventManager`] from a tokio interval: one `flush_deferred`
//! per tick, one `teardown` at the end.
//!
//! The manager is `!Send`, so the driver must run on a current-thread
//! runtime (or inside a `LocalSet`) and is never spawned onto a pool.

use crate::error::BusResult;
use crate::manager::{EventManager, TeardownReport};
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Default tick period (60 ticks per second).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_micros(16_667);

/// Shortest accepted tick period. Shorter periods, zero included, are raised
/// to this.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a completed [`TickDriver::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// Flushes performed.
    pub ticks: u64,
    /// What teardown found still registered.
    pub teardown: TeardownReport,
}

/// Calls `flush_deferred` once per interval and `teardown` once at the end.
#[derive(Debug, Clone)]
pub struct TickDriver {
    interval: Duration,
    max_ticks: Option<u64>,
}

impl TickDriver {
    /// Driver ticking every `interval`, clamped to [`MIN_TICK_INTERVAL`].
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        if interval < MIN_TICK_INTERVAL {
            warn!(
                requested_us = interval.as_micros() as u64,
                "Tick interval below minimum, clamping to 1ms"
            );
        }
        Self {
            interval: interval.max(MIN_TICK_INTERVAL),
            max_ticks: None,
        }
    }

    /// Stop after `max_ticks` flushes even if shutdown was never signalled.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick until `shutdown` resolves or the tick budget is spent, then
    /// tear the manager down.
    ///
    /// Missed ticks are skipped rather than replayed.
    ///
    /// # Errors
    ///
    /// A listener failure during a flush stops the loop. The manager is
    /// still torn down before the error is returned.
    pub async fn run<F>(&self, bus: &EventManager, shutdown: F) -> BusResult<TickSummary>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            max_ticks = ?self.max_ticks,
            "Tick driver started"
        );

        let mut ticks: u64 = 0;
        let outcome = loop {
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                debug!(ticks, "Tick budget exhausted");
                break Ok(());
            }

            tokio::select! {
                biased;
                () = &mut shutdown => {
                    debug!(ticks, "Shutdown signalled");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = bus.flush_deferred() {
                        error!(error = %e, ticks, "Flush failed, stopping tick driver");
                        break Err(e);
                    }
                    ticks += 1;
                }
            }
        };

        let teardown = bus.teardown();
        info!(ticks, clean = teardown.is_clean(), "Tick driver stopped");
        outcome.map(|()| TickSummary { ticks, teardown })
    }
}

impl Default for TickDriver {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}
