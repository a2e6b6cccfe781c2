// packages/engine/src/trace/context.rs
//! Producer handle and composition root

use crate::backend::open_backend;
use crate::observability::ENTRIES_INSERTED;
use crate::trace::entry::{
    real_time_stamp, BindingKind, Entry, ModulePhase, ProcKind, ProtocolKind, RawEntry,
    SimTime, SubjectId,
};
use crate::trace::meta::MetaInfo;
use crate::trace::pipeline::{Pipeline, WorkerReport};
use crate::trace::queue::EventQueue;
use crate::trace::sampling::{install_signal_toggle, SamplingGate};
use crate::utils::config::EngineConfig;
use crate::utils::errors::Result;
use metrics::counter;
use std::sync::Arc;
use tracing::info;

/// Cheap, clonable handle producers insert through
#[derive(Debug, Clone)]
pub struct Tracer {
    queue: Arc<EventQueue>,
}

impl Tracer {
    pub(crate) fn new(queue: Arc<EventQueue>) -> Self {
        Self { queue }
    }

    /// Hand an entry over to the consumer
    pub fn insert(&self, entry: Entry) {
        counter!(ENTRIES_INSERTED).increment(1);
        self.queue.insert(entry);
    }

    /// Insert a numeric record; malformed records are dropped by the consumer
    pub fn insert_raw(&self, raw: RawEntry) {
        self.insert(Entry::from_raw(raw));
    }

    pub fn module_created(&self, id: SubjectId, name: impl Into<String>, kind: impl Into<String>) {
        self.insert(Entry::ModuleCreated {
            id,
            name: name.into(),
            kind: kind.into(),
        });
    }

    pub fn process_created(&self, id: SubjectId, name: impl Into<String>, kind: ProcKind) {
        self.insert(Entry::ProcessCreated {
            id,
            name: name.into(),
            kind,
        });
    }

    pub fn port_created(&self, id: SubjectId, name: impl Into<String>) {
        self.insert(Entry::PortCreated {
            id,
            name: name.into(),
        });
    }

    pub fn event_created(&self, id: SubjectId, name: impl Into<String>) {
        self.insert(Entry::EventCreated {
            id,
            name: name.into(),
        });
    }

    pub fn channel_created(&self, id: SubjectId, name: impl Into<String>, kind: impl Into<String>) {
        self.insert(Entry::ChannelCreated {
            id,
            name: name.into(),
            kind: kind.into(),
        });
    }

    pub fn port_bound(
        &self,
        from: SubjectId,
        to: SubjectId,
        binding: BindingKind,
        protocol: ProtocolKind,
    ) {
        self.insert(Entry::PortBound {
            from,
            to,
            binding,
            protocol,
        });
    }

    pub fn module_phase_started(&self, id: SubjectId, phase: ModulePhase) {
        self.insert(Entry::ModulePhaseStarted {
            id,
            phase,
            real_time: real_time_stamp(),
        });
    }

    pub fn module_phase_finished(&self, id: SubjectId, phase: ModulePhase) {
        self.insert(Entry::ModulePhaseFinished {
            id,
            phase,
            real_time: real_time_stamp(),
        });
    }

    pub fn process_start(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::ProcessStart {
            id,
            real_time: real_time_stamp(),
            sim_time,
        });
    }

    pub fn process_yield(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::ProcessYield {
            id,
            real_time: real_time_stamp(),
            sim_time,
        });
    }

    pub fn event_notify_immediate(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::EventNotifyImmediate {
            id,
            real_time: real_time_stamp(),
            sim_time,
        });
    }

    pub fn event_notify_delta(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::EventNotifyDelta {
            id,
            real_time: real_time_stamp(),
            sim_time,
        });
    }

    pub fn event_notify_timed(&self, id: SubjectId, sim_time: SimTime, delay: SimTime) {
        self.insert(Entry::EventNotifyTimed {
            id,
            real_time: real_time_stamp(),
            sim_time,
            delay,
        });
    }

    pub fn event_cancel(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::EventCancel {
            id,
            real_time: real_time_stamp(),
            sim_time,
        });
    }

    pub fn channel_update_start(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::ChannelUpdateStart {
            id,
            real_time: real_time_stamp(),
            sim_time,
        });
    }

    pub fn channel_update_complete(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::ChannelUpdateComplete {
            id,
            real_time: real_time_stamp(),
            sim_time,
        });
    }

    pub fn cpu_idle_enter(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::CpuIdleEnter { id, sim_time });
    }

    pub fn cpu_idle_leave(&self, id: SubjectId, sim_time: SimTime) {
        self.insert(Entry::CpuIdleLeave { id, sim_time });
    }

    pub fn cpu_call_stack(
        &self,
        id: SubjectId,
        sim_time: SimTime,
        level: u32,
        address: u64,
        symbol: impl Into<String>,
    ) {
        self.insert(Entry::CpuCallStack {
            id,
            sim_time,
            level,
            address,
            symbol: symbol.into(),
        });
    }

    pub fn transaction_trace_fw(
        &self,
        id: SubjectId,
        sim_time: SimTime,
        protocol: ProtocolKind,
        payload: impl Into<String>,
    ) {
        self.insert(Entry::TransactionTraceFw {
            id,
            sim_time,
            protocol,
            payload: payload.into(),
        });
    }

    pub fn transaction_trace_bw(
        &self,
        id: SubjectId,
        sim_time: SimTime,
        protocol: ProtocolKind,
        payload: impl Into<String>,
    ) {
        self.insert(Entry::TransactionTraceBw {
            id,
            sim_time,
            protocol,
            payload: payload.into(),
        });
    }

    pub fn log_message(
        &self,
        sim_time: SimTime,
        level: i32,
        sender: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.insert(Entry::LogMessage {
            sim_time,
            level,
            sender: sender.into(),
            message: message.into(),
        });
    }
}

/// Running trace session built from configuration
pub struct TraceContext {
    pipeline: Pipeline,
    tracer: Tracer,
}

impl TraceContext {
    /// Build and start a session, or `Ok(None)` when tracing is disabled.
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>> {
        let Some(kind) = config.backend_kind() else {
            info!("Tracing disabled");
            return Ok(None);
        };

        // the signal can only reach the shared gate; bind it before any
        // artifact is created
        let gate = if config.signal_toggle {
            let gate = SamplingGate::process();
            gate.set_enabled(config.sampling_enabled);
            install_signal_toggle(&gate)?;
            gate
        } else {
            SamplingGate::new(config.sampling_enabled)
        };

        let backend = open_backend(kind, &config.output_dir)?;
        let mut pipeline = Pipeline::new(backend, gate);
        pipeline.start(MetaInfo::capture(config.tool_version.as_deref()))?;

        info!(
            "Tracing into {:?} ({} backend, sampling {})",
            config.output_dir,
            kind.as_str(),
            if config.sampling_enabled { "on" } else { "off" }
        );

        let tracer = pipeline.tracer();
        Ok(Some(Self { pipeline, tracer }))
    }

    pub fn tracer(&self) -> Tracer {
        self.tracer.clone()
    }

    pub fn gate(&self) -> &SamplingGate {
        self.pipeline.gate()
    }

    /// Stop the writer after a final drain
    pub fn shutdown(mut self) -> Result<WorkerReport> {
        self.pipeline.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path, options: &str) -> EngineConfig {
        EngineConfig {
            signal_toggle: false,
            ..EngineConfig::default()
        }
        .with_output_dir(dir)
        .with_options(options)
    }

    #[test]
    fn test_disabled() {
        let dir = tempdir().unwrap();
        assert!(TraceContext::from_config(&config(dir.path(), "0"))
            .unwrap()
            .is_none());

        let unset = EngineConfig::default().with_output_dir(dir.path());
        assert!(TraceContext::from_config(&unset).unwrap().is_none());
    }

    #[test]
    fn test_csv_session() {
        let dir = tempdir().unwrap();
        let ctx = TraceContext::from_config(&config(dir.path(), "csv")).unwrap().unwrap();

        let tracer = ctx.tracer();
        tracer.module_created(1, "cpu0", "processor");
        tracer.process_start(2, 100);
        tracer.process_yield(2, 100);

        let report = ctx.shutdown().unwrap();
        assert_eq!(report.backend, "csv");
        assert_eq!(report.dispatch.dispatched, 3);

        let modules = std::fs::read_to_string(
            dir.path().join(format!("modules.{}.csv", std::process::id())),
        )
        .unwrap();
        assert_eq!(modules, "1,cpu0,processor\n");
    }

    #[test]
    fn test_sampling_disabled_by_config() {
        let dir = tempdir().unwrap();
        let cfg = EngineConfig {
            sampling_enabled: false,
            ..config(dir.path(), "sqlite")
        };
        let ctx = TraceContext::from_config(&cfg).unwrap().unwrap();
        assert!(!ctx.gate().is_enabled());

        let tracer = ctx.tracer();
        tracer.event_created(1, "ev");
        tracer.event_notify_delta(1, 0);

        let report = ctx.shutdown().unwrap();
        assert_eq!(report.backend, "sqlite");
        assert_eq!(report.dispatch.dispatched, 1);
        assert_eq!(report.dispatch.filtered, 1);
    }

    #[test]
    fn test_insert_raw_malformed_dropped() {
        let dir = tempdir().unwrap();
        let ctx = TraceContext::from_config(&config(dir.path(), "csv")).unwrap().unwrap();

        ctx.tracer().insert_raw(RawEntry::new(200, 1));
        ctx.tracer().port_created(2, "data");

        let report = ctx.shutdown().unwrap();
        assert_eq!(report.dispatch.dropped, 1);
        assert_eq!(report.dispatch.dispatched, 1);
    }
}
