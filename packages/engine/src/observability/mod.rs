// packages/engine/src/observability/mod.rs
//! Logging and metrics for the engine itself
//!
//! Diagnostics go to stderr through `tracing`. Pipeline counters are emitted
//! through the `metrics` facade; they are free until the host installs a
//! recorder.

use crate::utils::errors::{EngineError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entries accepted by `insert`
pub const ENTRIES_INSERTED: &str = "simtrace_entries_inserted_total";

/// Entries handed to a backend handler
pub const ENTRIES_DISPATCHED: &str = "simtrace_entries_dispatched_total";

/// Entries suppressed by the sampling window
pub const ENTRIES_FILTERED: &str = "simtrace_entries_filtered_total";

/// Unknown or malformed entries dropped by the dispatcher
pub const ENTRIES_DROPPED: &str = "simtrace_entries_dropped_total";

/// Drain cycles that reached the backend
pub const BATCHES: &str = "simtrace_batches_total";

/// Entries per drain cycle
pub const BATCH_SIZE: &str = "simtrace_batch_size";

/// Install the stderr subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init_tracing(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| EngineError::ConfigError(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| EngineError::ConfigError(format!("Tracing already initialized: {}", e)))?;

    Ok(())
}
