//! Structured logging.
//!
//! Uses the `tracing` crate throughout. [`init`] installs a fmt subscriber
//! whose filter comes from `RUST_LOG` when set, else from the configured level.
//! Per-call trace lines are emitted on the `trace` target.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target for the per-call trace log line.
pub const TRACE_TARGET: &str = "trace";

/// Install the global subscriber. Fails if one is already installed.
pub fn init(default_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("traced_client={level},{TRACE_TARGET}={level}", level = default_level).into()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
