// packages/engine/src/lib.rs
//! Simtrace Engine Library
//!
//! Asynchronous trace sink for discrete-event hardware simulators. Simulation
//! threads hand typed entries to a queue; a single writer thread persists
//! them in batches to a CSV export or a SQLite database.
//!
//! # Architecture
//!
//! - **trace**: entries, queue, sampling gate, dispatcher and pipeline
//! - **backend**: CSV, SQLite and in-memory persistence
//! - **observability**: logging setup and metric names
//! - **utils**: configuration and errors

pub mod backend;
pub mod observability;
pub mod trace;
pub mod utils;

// Re-export commonly used types
pub use backend::{open_backend, TraceBackend};
pub use trace::{Entry, Pipeline, SamplingGate, TraceContext, Tracer};
pub use utils::config::{BackendKind, EngineConfig};
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
