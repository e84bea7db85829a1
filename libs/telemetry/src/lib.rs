//! Lightweight telemetry helpers for the castbridge crates.
//! Provides the tracing-subscriber bootstrap, metric recorders, and the
//! shared label set attached to counters.

use anyhow::{Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod context;
mod metrics;

pub use context::TelemetryLabels;
pub use metrics::{record_counter, record_gauge, record_histogram};

/// Installs the process-wide tracing subscriber configured from `RUST_LOG`.
/// Safe to call once per process; a second call reports the conflict instead
/// of panicking.
pub fn install(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;
    info!(service = service_name, "telemetry installed");
    Ok(())
}
