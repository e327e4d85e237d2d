//! # Envoy Telemetry
//!
//! Logging setup for processes hosting an Envoy bus.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use envoy_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//!
//!     // Bus diagnostics now show up as structured log records
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ENVOY_SERVICE_NAME` | `envoy` | Service name in log records |
//! | `ENVOY_LOG_LEVEL` | `info` | Level or `EnvFilter` directive |
//! | `ENVOY_JSON_LOGS` | `false` | JSON output (default on in containers) |
//! | `ENVOY_CONSOLE_OUTPUT` | `true` | Write to stdout at all |
//! | `ENVOY_LOG_SOURCE` | `false` | Include file and line |

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::init_test_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install structured logging for the process.
///
/// Returns a guard that should be held for the lifetime of the application.
///
/// # Errors
///
/// - `TelemetryError::Filter` if the log level is not a valid directive
/// - `TelemetryError::AlreadyInitialized` if called twice
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    tracing_setup::init_tracing(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active. Logs a final record on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for creating a span with component context.
///
/// # Example
///
/// ```rust,ignore
/// use envoy_telemetry::component_span;
///
/// fn run_tick(tick: u64) {
///     let _span = component_span!("tick", component = "host", tick = tick).entered();
///     // ... flush the bus
/// }
/// ```
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
