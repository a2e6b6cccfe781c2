// packages/engine/src/backend/mod.rs
//! Persistence backends
//!
//! Every backend implements [`TraceBackend`]: a batch bracket
//! (`begin`/`end`), one typed handler per entry kind, and `finish` for the
//! final flush. Backends are driven exclusively by the consumer thread, so
//! they take `&mut self` and need no locking.
//!
//! - **CSV**: one delimited-text file per table
//! - **SQLite**: one database, one transaction per drain cycle
//! - **Memory**: typed records kept in memory, for tests and embedding

pub mod csv;
pub mod memory;
pub mod sqlite;

pub use self::csv::CsvBackend;
pub use self::memory::{MemoryBackend, Record};
pub use self::sqlite::SqliteBackend;

use crate::trace::entry::{
    BindingKind, ModulePhase, ProcKind, ProtocolKind, RealTime, SimTime, SubjectId,
};
use crate::trace::meta::MetaInfo;
use crate::utils::config::BackendKind;
use crate::utils::errors::Result;
use std::path::Path;

/// Logical tables shared by all backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Meta,
    Modules,
    Processes,
    Ports,
    Events,
    Channels,
    Elab,
    Sched,
    Notify,
    Updates,
    Bindings,
    CpuIdle,
    CpuStack,
    Transactions,
    LogMsg,
}

impl Table {
    pub const ALL: [Table; 15] = [
        Table::Meta,
        Table::Modules,
        Table::Processes,
        Table::Ports,
        Table::Events,
        Table::Channels,
        Table::Elab,
        Table::Sched,
        Table::Notify,
        Table::Updates,
        Table::Bindings,
        Table::CpuIdle,
        Table::CpuStack,
        Table::Transactions,
        Table::LogMsg,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Meta => "meta",
            Table::Modules => "modules",
            Table::Processes => "processes",
            Table::Ports => "ports",
            Table::Events => "events",
            Table::Channels => "channels",
            Table::Elab => "elab",
            Table::Sched => "sched",
            Table::Notify => "notify",
            Table::Updates => "updates",
            Table::Bindings => "bindings",
            Table::CpuIdle => "cpuidle",
            Table::CpuStack => "cpustack",
            Table::Transactions => "transactions",
            Table::LogMsg => "logmsg",
        }
    }

    /// Stem of the exported `<stem>.<pid>.csv` file
    pub fn file_stem(&self) -> &'static str {
        match self {
            Table::Sched => "scheduling",
            Table::Updates => "update",
            other => other.name(),
        }
    }
}

/// A persistence strategy for trace entries
pub trait TraceBackend: Send {
    /// Short name for diagnostics
    fn name(&self) -> &'static str;

    /// Called before the first entry of a drain cycle
    fn begin(&mut self, _batch_size: usize) -> Result<()> {
        Ok(())
    }

    /// Called after the last entry of a drain cycle
    fn end(&mut self, _batch_size: usize) -> Result<()> {
        Ok(())
    }

    /// Called once when the consumer exits
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_meta(&mut self, meta: &MetaInfo) -> Result<()>;

    fn module_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()>;
    fn process_created(&mut self, id: SubjectId, name: &str, kind: ProcKind) -> Result<()>;
    fn port_created(&mut self, id: SubjectId, name: &str) -> Result<()>;
    fn event_created(&mut self, id: SubjectId, name: &str) -> Result<()>;
    fn channel_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()>;

    fn port_bound(
        &mut self,
        from: SubjectId,
        to: SubjectId,
        binding: BindingKind,
        protocol: ProtocolKind,
    ) -> Result<()>;

    fn module_phase_started(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()>;
    fn module_phase_finished(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()>;

    fn process_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()>;
    fn process_yield(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()>;

    fn event_notify_immediate(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()>;
    fn event_notify_delta(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()>;
    fn event_notify_timed(
        &mut self,
        id: SubjectId,
        rt: RealTime,
        st: SimTime,
        delay: SimTime,
    ) -> Result<()>;
    fn event_cancel(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()>;

    fn channel_update_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()>;
    fn channel_update_complete(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()>;

    fn cpu_idle_enter(&mut self, id: SubjectId, st: SimTime) -> Result<()>;
    fn cpu_idle_leave(&mut self, id: SubjectId, st: SimTime) -> Result<()>;

    fn cpu_call_stack(
        &mut self,
        id: SubjectId,
        st: SimTime,
        level: u32,
        address: u64,
        symbol: &str,
    ) -> Result<()>;

    fn transaction_trace_fw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()>;
    fn transaction_trace_bw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()>;

    fn log_message(&mut self, st: SimTime, level: i32, sender: &str, message: &str) -> Result<()>;
}

/// Build the backend selected by configuration, writing into `output_dir`
pub fn open_backend(kind: BackendKind, output_dir: &Path) -> Result<Box<dyn TraceBackend>> {
    let backend: Box<dyn TraceBackend> = match kind {
        BackendKind::Csv => Box::new(CsvBackend::create(output_dir)?),
        BackendKind::Sqlite => Box::new(SqliteBackend::open(output_dir)?),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_unique() {
        let mut names: Vec<&str> = Table::ALL.iter().map(Table::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Table::ALL.len());
    }

    #[test]
    fn test_file_stems() {
        assert_eq!(Table::Sched.name(), "sched");
        assert_eq!(Table::Sched.file_stem(), "scheduling");
        assert_eq!(Table::Updates.name(), "updates");
        assert_eq!(Table::Updates.file_stem(), "update");
        assert_eq!(Table::Modules.file_stem(), "modules");

        let mut stems: Vec<&str> = Table::ALL.iter().map(Table::file_stem).collect();
        stems.sort_unstable();
        stems.dedup();
        assert_eq!(stems.len(), Table::ALL.len());
    }

    #[test]
    fn test_open_backend() {
        let dir = tempfile::tempdir().unwrap();

        let csv = open_backend(BackendKind::Csv, dir.path()).unwrap();
        assert_eq!(csv.name(), "csv");

        let sqlite = open_backend(BackendKind::Sqlite, dir.path()).unwrap();
        assert_eq!(sqlite.name(), "sqlite");
    }
}
