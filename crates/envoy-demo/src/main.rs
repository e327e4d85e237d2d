//! # Envoy Demo Host
//!
//! Boots a bus the way a game host would and drives it from a fixed tick.
//!
//! ## Startup Sequence
//!
//! 1. Install structured logging
//! 2. Load bus and host configuration from the environment
//! 3. Build the event manager and attach the arena
//! 4. Seed a few events and start the frame heartbeat
//! 5. Tick until Ctrl+C (or the tick budget), detach, tear down
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ENVOY_TICK_MS` | `16` | Tick period in milliseconds |
//! | `ENVOY_MAX_TICKS` | unset | Stop after this many ticks |
//! | `ENVOY_DIFFICULTY` | `1.0` | Health multiplier for spawned players |
//!
//! Bus settings (`ENVOY_REPORT_LEAKS`, `ENVOY_DISPATCH_MODES`) and logging
//! settings (`ENVOY_LOG_LEVEL`, `ENVOY_JSON_LOGS`, ...) are read by the
//! respective crates.

mod arena;

use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use envoy_bus::{BusConfig, EventManager, TickDriver};
use envoy_telemetry::{component_span, init_telemetry, log_event, TelemetryConfig};
use tracing::{info, warn};

use crate::arena::{Arena, DamageDealt, Difficulty, FrameEnded, PlayerId, PlayerSpawned};

const COMPONENT: &str = "host";

/// Host-level settings.
#[derive(Debug, Clone, PartialEq)]
struct HostConfig {
    tick: Duration,
    max_ticks: Option<u64>,
    difficulty: f32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(16),
            max_ticks: None,
            difficulty: 1.0,
        }
    }
}

impl HostConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(ms) = lookup("ENVOY_TICK_MS") {
            match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => config.tick = Duration::from_millis(ms),
                _ => warn!(value = %ms, "ENVOY_TICK_MS must be a positive integer"),
            }
        }
        if let Some(max) = lookup("ENVOY_MAX_TICKS") {
            match max.parse() {
                Ok(max) => config.max_ticks = Some(max),
                Err(_) => warn!(value = %max, "ENVOY_MAX_TICKS must be an integer"),
            }
        }
        if let Some(difficulty) = lookup("ENVOY_DIFFICULTY") {
            match difficulty.parse::<f32>() {
                Ok(d) if d.is_finite() && d > 0.0 => config.difficulty = d,
                _ => warn!(value = %difficulty, "ENVOY_DIFFICULTY must be a positive number"),
            }
        }

        config
    }
}

fn load_config() -> HostConfig {
    HostConfig::from_lookup(|key| std::env::var(key).ok())
}

fn seed(bus: &EventManager) -> Result<()> {
    for id in 1..=3 {
        bus.dispatch(PlayerSpawned { id: PlayerId(id) })?;
    }
    bus.dispatch(DamageDealt {
        target: PlayerId(2),
        amount: 250,
    })?;
    bus.dispatch(FrameEnded { frame: 0 })?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_service("envoy-demo"))
        .context("Failed to initialize telemetry")?;

    let host = load_config();
    let bus_config = BusConfig::from_env().context("Invalid bus configuration")?;
    let bus = Rc::new(
        arena::configure(EventManager::builder())
            .config(bus_config)
            .try_build()
            .context("Failed to build event manager")?,
    );

    let arena = Arena::attach(&bus, Difficulty(host.difficulty));
    {
        let _span = component_span!("seed", component = COMPONENT).entered();
        seed(&bus)?;
    }
    log_event!(
        info,
        COMPONENT,
        "Arena ready",
        players = arena.player_count(),
        defeated = arena.defeated().len()
    );

    match host.max_ticks {
        Some(max) => info!(max_ticks = max, "Running until the tick budget is spent"),
        None => info!("Host is running. Press Ctrl+C to stop."),
    }

    // The arena detaches inside the shutdown future so the driver's
    // teardown only reports real leaks.
    let shutdown = async {
        match host.max_ticks {
            Some(max) => {
                let ticks = u32::try_from(max).unwrap_or(u32::MAX);
                tokio::time::sleep(host.tick.saturating_mul(ticks)).await;
            }
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        }
        arena.detach();
    };

    let summary = TickDriver::new(host.tick).run(&bus, shutdown).await?;

    let stats = bus.stats();
    log_event!(
        info,
        COMPONENT,
        "Host stopped",
        ticks = summary.ticks,
        frames = arena.frames(),
        dispatched_now = stats.dispatched_now,
        flushed = stats.flushed,
        clean = summary.teardown.is_clean()
    );

    Ok(())
}
