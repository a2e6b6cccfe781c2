// packages/engine/src/trace/dispatcher.rs
//! Routes drained entries to the backend
//!
//! One drain cycle is one batch: `begin(n)`, one handler call per admitted
//! entry in insertion order, `end(n)`. Entries are consumed by value, so any
//! strings they own are released right after their handler returns.

use crate::backend::TraceBackend;
use crate::observability::{
    BATCHES, BATCH_SIZE, ENTRIES_DISPATCHED, ENTRIES_DROPPED, ENTRIES_FILTERED,
};
use crate::trace::entry::Entry;
use crate::trace::meta::MetaInfo;
use crate::trace::sampling::{SamplingGate, SamplingWindow};
use crate::utils::errors::Result;
use metrics::{counter, histogram};
use tracing::{debug, warn};

/// Outcome of one drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Entries handed to a backend handler
    pub dispatched: usize,

    /// Entries suppressed by the sampling window
    pub filtered: usize,

    /// Unknown entries dropped
    pub dropped: usize,
}

/// Running totals across all batches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub batches: u64,
    pub dispatched: u64,
    pub filtered: u64,
    pub dropped: u64,
}

impl DispatchStats {
    fn add(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.dispatched += report.dispatched as u64;
        self.filtered += report.filtered as u64;
        self.dropped += report.dropped as u64;
    }
}

/// Consumer-side driver of a backend
pub struct Dispatcher {
    backend: Box<dyn TraceBackend>,
    window: SamplingWindow,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(backend: Box<dyn TraceBackend>, gate: SamplingGate) -> Self {
        Self {
            backend,
            window: SamplingWindow::new(gate),
            stats: DispatchStats::default(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn write_meta(&mut self, meta: &MetaInfo) -> Result<()> {
        self.backend.write_meta(meta)
    }

    /// Persist one drained batch. Empty batches do not reach the backend.
    pub fn dispatch_batch(&mut self, entries: Vec<Entry>) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        let batch_size = entries.len();
        self.backend.begin(batch_size)?;

        for entry in entries {
            if let Entry::Unknown { code, id } = entry {
                warn!("Dropping entry with unknown kind {} (subject {})", code, id);
                report.dropped += 1;
                continue;
            }

            if !self.window.admit(&entry) {
                report.filtered += 1;
                continue;
            }

            self.dispatch(entry)?;
            report.dispatched += 1;
        }

        self.backend.end(batch_size)?;

        counter!(BATCHES).increment(1);
        counter!(ENTRIES_DISPATCHED).increment(report.dispatched as u64);
        counter!(ENTRIES_FILTERED).increment(report.filtered as u64);
        counter!(ENTRIES_DROPPED).increment(report.dropped as u64);
        histogram!(BATCH_SIZE).record(batch_size as f64);

        debug!(
            "Batch of {}: {} dispatched, {} filtered, {} dropped",
            batch_size, report.dispatched, report.filtered, report.dropped
        );

        self.stats.add(&report);
        Ok(report)
    }

    /// Final flush of the backend
    pub fn finish(&mut self) -> Result<()> {
        self.backend.finish()
    }

    fn dispatch(&mut self, entry: Entry) -> Result<()> {
        let backend = self.backend.as_mut();

        match entry {
            Entry::ModuleCreated { id, name, kind } => backend.module_created(id, &name, &kind),
            Entry::ProcessCreated { id, name, kind } => backend.process_created(id, &name, kind),
            Entry::PortCreated { id, name } => backend.port_created(id, &name),
            Entry::EventCreated { id, name } => backend.event_created(id, &name),
            Entry::ChannelCreated { id, name, kind } => backend.channel_created(id, &name, &kind),
            Entry::PortBound {
                from,
                to,
                binding,
                protocol,
            } => backend.port_bound(from, to, binding, protocol),
            Entry::ModulePhaseStarted { id, phase, real_time } => {
                backend.module_phase_started(id, phase, real_time)
            }
            Entry::ModulePhaseFinished { id, phase, real_time } => {
                backend.module_phase_finished(id, phase, real_time)
            }
            Entry::ProcessStart { id, real_time, sim_time } => {
                backend.process_start(id, real_time, sim_time)
            }
            Entry::ProcessYield { id, real_time, sim_time } => {
                backend.process_yield(id, real_time, sim_time)
            }
            Entry::EventNotifyImmediate { id, real_time, sim_time } => {
                backend.event_notify_immediate(id, real_time, sim_time)
            }
            Entry::EventNotifyDelta { id, real_time, sim_time } => {
                backend.event_notify_delta(id, real_time, sim_time)
            }
            Entry::EventNotifyTimed {
                id,
                real_time,
                sim_time,
                delay,
            } => backend.event_notify_timed(id, real_time, sim_time, delay),
            Entry::EventCancel { id, real_time, sim_time } => {
                backend.event_cancel(id, real_time, sim_time)
            }
            Entry::ChannelUpdateStart { id, real_time, sim_time } => {
                backend.channel_update_start(id, real_time, sim_time)
            }
            Entry::ChannelUpdateComplete { id, real_time, sim_time } => {
                backend.channel_update_complete(id, real_time, sim_time)
            }
            Entry::CpuIdleEnter { id, sim_time } => backend.cpu_idle_enter(id, sim_time),
            Entry::CpuIdleLeave { id, sim_time } => backend.cpu_idle_leave(id, sim_time),
            Entry::CpuCallStack {
                id,
                sim_time,
                level,
                address,
                symbol,
            } => backend.cpu_call_stack(id, sim_time, level, address, &symbol),
            Entry::TransactionTraceFw {
                id,
                sim_time,
                protocol,
                payload,
            } => backend.transaction_trace_fw(id, sim_time, protocol, &payload),
            Entry::TransactionTraceBw {
                id,
                sim_time,
                protocol,
                payload,
            } => backend.transaction_trace_bw(id, sim_time, protocol, &payload),
            Entry::LogMessage {
                sim_time,
                level,
                sender,
                message,
            } => backend.log_message(sim_time, level, &sender, &message),
            // filtered out before dispatch
            Entry::Unknown { .. } => Ok(()),
        }
    }
}
