// packages/engine/src/trace/mod.rs
//! Trace capture
//!
//! - **entry**: typed trace entries and the numeric record decoder
//! - **queue**: swap-drain MPSC queue between producers and the writer
//! - **sampling**: runtime gate for high-frequency kinds
//! - **dispatcher**: routes a drained batch to the backend
//! - **pipeline**: owns the queue and the `simtrace-writer` thread
//! - **context**: producer handle and the configuration-driven session
//! - **meta**: process identity written once per run

pub mod context;
pub mod dispatcher;
pub mod entry;
pub mod meta;
pub mod pipeline;
pub mod queue;
pub mod sampling;

pub use context::{TraceContext, Tracer};
pub use dispatcher::{BatchReport, DispatchStats, Dispatcher};
pub use entry::{
    BindingKind, Entry, EntryKind, ModulePhase, ProcKind, ProtocolKind, RawEntry, Slot,
};
pub use meta::MetaInfo;
pub use pipeline::{Pipeline, WorkerReport};
pub use queue::{EventQueue, QueueStats};
pub use sampling::{install_signal_toggle, SamplingGate};
