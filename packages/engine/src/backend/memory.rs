// packages/engine/src/backend/memory.rs
//! In-memory backend that keeps every call as a typed record

use crate::backend::TraceBackend;
use crate::trace::entry::{
    BindingKind, Entry, ModulePhase, ProcKind, ProtocolKind, RealTime, SimTime, SubjectId,
};
use crate::trace::meta::MetaInfo;
use crate::utils::errors::{EngineError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// One backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Meta(MetaInfo),
    Begin(usize),
    End(usize),
    Entry(Entry),
    Finish,
}

/// Backend recording into a shared vector
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<Vec<Record>>>,

    /// Fail every entry handler once this many entries were stored
    fail_after: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject entries once `n` have been stored
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Shared view of the records, usable after the backend moved away
    pub fn handle(&self) -> Arc<Mutex<Vec<Record>>> {
        Arc::clone(&self.records)
    }

    /// Snapshot of all records so far
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Stored entries only, in order
    pub fn entries(&self) -> Vec<Entry> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| match record {
                Record::Entry(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, entry: Entry) -> Result<()> {
        let mut records = self.records.lock();
        if let Some(limit) = self.fail_after {
            let stored = records
                .iter()
                .filter(|record| matches!(record, Record::Entry(_)))
                .count();
            if stored >= limit {
                return Err(EngineError::StorageFailed(format!(
                    "memory backend full after {} entries",
                    limit
                )));
            }
        }
        records.push(Record::Entry(entry));
        Ok(())
    }
}

impl TraceBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn begin(&mut self, batch_size: usize) -> Result<()> {
        self.records.lock().push(Record::Begin(batch_size));
        Ok(())
    }

    fn end(&mut self, batch_size: usize) -> Result<()> {
        self.records.lock().push(Record::End(batch_size));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.records.lock().push(Record::Finish);
        Ok(())
    }

    fn write_meta(&mut self, meta: &MetaInfo) -> Result<()> {
        self.records.lock().push(Record::Meta(meta.clone()));
        Ok(())
    }

    fn module_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()> {
        self.push(Entry::ModuleCreated {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
        })
    }

    fn process_created(&mut self, id: SubjectId, name: &str, kind: ProcKind) -> Result<()> {
        self.push(Entry::ProcessCreated {
            id,
            name: name.to_string(),
            kind,
        })
    }

    fn port_created(&mut self, id: SubjectId, name: &str) -> Result<()> {
        self.push(Entry::PortCreated {
            id,
            name: name.to_string(),
        })
    }

    fn event_created(&mut self, id: SubjectId, name: &str) -> Result<()> {
        self.push(Entry::EventCreated {
            id,
            name: name.to_string(),
        })
    }

    fn channel_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()> {
        self.push(Entry::ChannelCreated {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
        })
    }

    fn port_bound(
        &mut self,
        from: SubjectId,
        to: SubjectId,
        binding: BindingKind,
        protocol: ProtocolKind,
    ) -> Result<()> {
        self.push(Entry::PortBound {
            from,
            to,
            binding,
            protocol,
        })
    }

    fn module_phase_started(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()> {
        self.push(Entry::ModulePhaseStarted {
            id,
            phase,
            real_time: rt,
        })
    }

    fn module_phase_finished(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()> {
        self.push(Entry::ModulePhaseFinished {
            id,
            phase,
            real_time: rt,
        })
    }

    fn process_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.push(Entry::ProcessStart {
            id,
            real_time: rt,
            sim_time: st,
        })
    }

    fn process_yield(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.push(Entry::ProcessYield {
            id,
            real_time: rt,
            sim_time: st,
        })
    }

    fn event_notify_immediate(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.push(Entry::EventNotifyImmediate {
            id,
            real_time: rt,
            sim_time: st,
        })
    }

    fn event_notify_delta(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.push(Entry::EventNotifyDelta {
            id,
            real_time: rt,
            sim_time: st,
        })
    }

    fn event_notify_timed(
        &mut self,
        id: SubjectId,
        rt: RealTime,
        st: SimTime,
        delay: SimTime,
    ) -> Result<()> {
        self.push(Entry::EventNotifyTimed {
            id,
            real_time: rt,
            sim_time: st,
            delay,
        })
    }

    fn event_cancel(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.push(Entry::EventCancel {
            id,
            real_time: rt,
            sim_time: st,
        })
    }

    fn channel_update_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.push(Entry::ChannelUpdateStart {
            id,
            real_time: rt,
            sim_time: st,
        })
    }

    fn channel_update_complete(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.push(Entry::ChannelUpdateComplete {
            id,
            real_time: rt,
            sim_time: st,
        })
    }

    fn cpu_idle_enter(&mut self, id: SubjectId, st: SimTime) -> Result<()> {
        self.push(Entry::CpuIdleEnter { id, sim_time: st })
    }

    fn cpu_idle_leave(&mut self, id: SubjectId, st: SimTime) -> Result<()> {
        self.push(Entry::CpuIdleLeave { id, sim_time: st })
    }

    fn cpu_call_stack(
        &mut self,
        id: SubjectId,
        st: SimTime,
        level: u32,
        address: u64,
        symbol: &str,
    ) -> Result<()> {
        self.push(Entry::CpuCallStack {
            id,
            sim_time: st,
            level,
            address,
            symbol: symbol.to_string(),
        })
    }

    fn transaction_trace_fw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()> {
        self.push(Entry::TransactionTraceFw {
            id,
            sim_time: st,
            protocol,
            payload: payload.to_string(),
        })
    }

    fn transaction_trace_bw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()> {
        self.push(Entry::TransactionTraceBw {
            id,
            sim_time: st,
            protocol,
            payload: payload.to_string(),
        })
    }

    fn log_message(&mut self, st: SimTime, level: i32, sender: &str, message: &str) -> Result<()> {
        self.push(Entry::LogMessage {
            sim_time: st,
            level,
            sender: sender.to_string(),
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut backend = MemoryBackend::new();
        let handle = backend.handle();

        backend.begin(1).unwrap();
        backend.port_created(2, "data").unwrap();
        backend.end(1).unwrap();
        backend.finish().unwrap();

        assert_eq!(
            *handle.lock(),
            vec![
                Record::Begin(1),
                Record::Entry(Entry::PortCreated {
                    id: 2,
                    name: "data".to_string()
                }),
                Record::End(1),
                Record::Finish,
            ]
        );
    }

    #[test]
    fn test_fail_after() {
        let mut backend = MemoryBackend::new().fail_after(1);
        backend.event_created(1, "e").unwrap();
        assert!(backend.event_created(2, "f").is_err());
        assert_eq!(backend.entries().len(), 1);
    }
}
