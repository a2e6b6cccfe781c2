// packages/engine/src/backend/csv.rs
//! Delimited-text export
//!
//! One `<stem>.<pid>.csv` file per table (see [`Table::file_stem`]), one
//! line per entry. Free-text fields are escaped by prefixing every `,` and
//! `\` with a backslash; nothing else is escaped, so readers must apply
//! [`unescape`] (or [`split_fields`]) when parsing.
//!
//! The export is lenient: write failures are counted and logged at debug
//! level but never stop the pipeline.

use crate::backend::{Table, TraceBackend};
use crate::trace::entry::{
    BindingKind, ModulePhase, ProcKind, ProtocolKind, RealTime, SimTime, SubjectId,
};
use crate::trace::meta::MetaInfo;
use crate::utils::errors::{EngineError, Result};
use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Escape a free-text field
pub fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains([',', '\\']) {
        return Cow::Borrowed(field);
    }

    let mut escaped = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c == ',' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Inverse of [`escape`]
pub fn unescape(field: &str) -> String {
    let mut unescaped = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => unescaped.push(next),
                None => unescaped.push('\\'),
            }
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

/// Split an exported line on unescaped commas and unescape every field
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                } else {
                    current.push('\\');
                }
            }
            ',' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// File path of one table
pub fn table_path(dir: &Path, table: Table, pid: u32) -> PathBuf {
    dir.join(format!("{}.{}.csv", table.file_stem(), pid))
}

/// CSV export backend
pub struct CsvBackend {
    dir: PathBuf,
    pid: u32,

    /// One stream per table, indexed by `Table as usize`
    streams: Vec<BufWriter<File>>,

    write_errors: u64,
}

impl CsvBackend {
    /// Open one file per table for the current process
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::create_for_pid(dir, std::process::id())
    }

    /// Open one file per table, naming them after `pid`
    pub fn create_for_pid<P: AsRef<Path>>(dir: P, pid: u32) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to create directory {:?}: {}", dir, e))
        })?;

        let mut streams = Vec::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let path = table_path(&dir, table, pid);
            let file = File::create(&path).map_err(|e| {
                EngineError::StorageFailed(format!("Failed to create {:?}: {}", path, e))
            })?;
            streams.push(BufWriter::new(file));
        }

        info!("CSV export writing to {:?} (pid {})", dir, pid);

        Ok(Self {
            dir,
            pid,
            streams,
            write_errors: 0,
        })
    }

    pub fn path(&self, table: Table) -> PathBuf {
        table_path(&self.dir, table, self.pid)
    }

    /// Writes that failed so far
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    fn write_line(&mut self, table: Table, line: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.streams[table as usize], "{}", line) {
            self.write_errors += 1;
            debug!("Dropped line for {}: {}", table.name(), e);
        }
    }
}

impl TraceBackend for CsvBackend {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn finish(&mut self) -> Result<()> {
        for (table, stream) in Table::ALL.iter().zip(self.streams.iter_mut()) {
            if let Err(e) = stream.flush() {
                self.write_errors += 1;
                debug!("Failed to flush {}: {}", table.name(), e);
            }
        }

        if self.write_errors > 0 {
            debug!("CSV export finished with {} failed writes", self.write_errors);
        }
        Ok(())
    }

    fn write_meta(&mut self, meta: &MetaInfo) -> Result<()> {
        self.write_line(
            Table::Meta,
            format_args!(
                "{},{},{},{},{}",
                meta.pid,
                escape(&meta.path),
                escape(&meta.user),
                escape(&meta.version),
                meta.timestamp
            ),
        );
        Ok(())
    }

    fn module_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()> {
        self.write_line(
            Table::Modules,
            format_args!("{},{},{}", id, escape(name), escape(kind)),
        );
        Ok(())
    }

    fn process_created(&mut self, id: SubjectId, name: &str, kind: ProcKind) -> Result<()> {
        self.write_line(
            Table::Processes,
            format_args!("{},{},{}", id, escape(name), kind.as_str()),
        );
        Ok(())
    }

    fn port_created(&mut self, id: SubjectId, name: &str) -> Result<()> {
        self.write_line(Table::Ports, format_args!("{},{}", id, escape(name)));
        Ok(())
    }

    fn event_created(&mut self, id: SubjectId, name: &str) -> Result<()> {
        self.write_line(Table::Events, format_args!("{},{}", id, escape(name)));
        Ok(())
    }

    fn channel_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()> {
        self.write_line(
            Table::Channels,
            format_args!("{},{},{}", id, escape(name), escape(kind)),
        );
        Ok(())
    }

    fn port_bound(
        &mut self,
        from: SubjectId,
        to: SubjectId,
        binding: BindingKind,
        protocol: ProtocolKind,
    ) -> Result<()> {
        self.write_line(
            Table::Bindings,
            format_args!("{},{},{},{}", from, to, binding.as_str(), protocol.as_str()),
        );
        Ok(())
    }

    fn module_phase_started(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()> {
        self.write_line(
            Table::Elab,
            format_args!("{},START,{},{}", rt, id, phase.as_str()),
        );
        Ok(())
    }

    fn module_phase_finished(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()> {
        self.write_line(
            Table::Elab,
            format_args!("{},FINISH,{},{}", rt, id, phase.as_str()),
        );
        Ok(())
    }

    fn process_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.write_line(Table::Sched, format_args!("{},START,{},{}", rt, id, st));
        Ok(())
    }

    fn process_yield(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.write_line(Table::Sched, format_args!("{},YIELD,{},{}", rt, id, st));
        Ok(())
    }

    fn event_notify_immediate(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.write_line(Table::Notify, format_args!("{},IMMEDIATE,{},{},0", rt, id, st));
        Ok(())
    }

    fn event_notify_delta(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.write_line(Table::Notify, format_args!("{},DELTA,{},{},0", rt, id, st));
        Ok(())
    }

    fn event_notify_timed(
        &mut self,
        id: SubjectId,
        rt: RealTime,
        st: SimTime,
        delay: SimTime,
    ) -> Result<()> {
        self.write_line(
            Table::Notify,
            format_args!("{},TIMED,{},{},{}", rt, id, st, delay),
        );
        Ok(())
    }

    fn event_cancel(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.write_line(Table::Notify, format_args!("{},CANCEL,{},{},0", rt, id, st));
        Ok(())
    }

    fn channel_update_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.write_line(Table::Updates, format_args!("{},START,{},{}", rt, id, st));
        Ok(())
    }

    fn channel_update_complete(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.write_line(Table::Updates, format_args!("{},COMPLETE,{},{}", rt, id, st));
        Ok(())
    }

    fn cpu_idle_enter(&mut self, id: SubjectId, st: SimTime) -> Result<()> {
        self.write_line(Table::CpuIdle, format_args!("{},{},IDLE_ENTER", st, id));
        Ok(())
    }

    fn cpu_idle_leave(&mut self, id: SubjectId, st: SimTime) -> Result<()> {
        self.write_line(Table::CpuIdle, format_args!("{},{},IDLE_LEAVE", st, id));
        Ok(())
    }

    fn cpu_call_stack(
        &mut self,
        id: SubjectId,
        st: SimTime,
        level: u32,
        address: u64,
        symbol: &str,
    ) -> Result<()> {
        self.write_line(
            Table::CpuStack,
            format_args!("{},{},{},{:#x},{}", st, id, level, address, escape(symbol)),
        );
        Ok(())
    }

    fn transaction_trace_fw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()> {
        self.write_line(
            Table::Transactions,
            format_args!("{},{},fw,{},{}", st, id, protocol.as_str(), escape(payload)),
        );
        Ok(())
    }

    fn transaction_trace_bw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()> {
        self.write_line(
            Table::Transactions,
            format_args!("{},{},bw,{},{}", st, id, protocol.as_str(), escape(payload)),
        );
        Ok(())
    }

    fn log_message(&mut self, st: SimTime, level: i32, sender: &str, message: &str) -> Result<()> {
        self.write_line(
            Table::LogMsg,
            format_args!("{},{},{},{}", st, level, escape(sender), escape(message)),
        );
        Ok(())
    }
}

impl Drop for CsvBackend {
    fn drop(&mut self) {
        for stream in &mut self.streams {
            let _ = stream.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn read(backend: &CsvBackend, table: Table) -> String {
        fs::read_to_string(backend.path(table)).unwrap()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));
        assert_eq!(escape("a,b"), "a\\,b");
        assert_eq!(escape("c:\\dir"), "c:\\\\dir");
        // quotes and newlines pass through untouched
        assert_eq!(escape("\"q\"\n"), "\"q\"\n");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\,b"), "a,b");
        assert_eq!(unescape("c:\\\\dir"), "c:\\dir");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_split_fields() {
        let line = format!("1,{},{}", escape("top.cpu,0"), escape("x\\y"));
        assert_eq!(split_fields(&line), vec!["1", "top.cpu,0", "x\\y"]);
    }

    proptest! {
        #[test]
        fn prop_escape_round_trip(s in ".*") {
            prop_assert_eq!(unescape(&escape(&s)), s);
        }

        #[test]
        fn prop_escaped_field_splits_whole(a in ".*", b in ".*") {
            let line = format!("{},{}", escape(&a), escape(&b));
            prop_assert_eq!(split_fields(&line), vec![a, b]);
        }
    }

    #[test]
    fn test_creates_all_tables() {
        let dir = tempdir().unwrap();
        let backend = CsvBackend::create_for_pid(dir.path(), 4242).unwrap();

        for table in Table::ALL {
            let path = dir.path().join(format!("{}.4242.csv", table.file_stem()));
            assert!(path.exists(), "missing {:?}", path);
            assert_eq!(backend.path(table), path);
        }

        assert!(dir.path().join("scheduling.4242.csv").exists());
        assert!(dir.path().join("update.4242.csv").exists());
        assert!(!dir.path().join("sched.4242.csv").exists());
        assert!(!dir.path().join("updates.4242.csv").exists());
    }

    #[test]
    fn test_entity_lines() {
        let dir = tempdir().unwrap();
        let mut backend = CsvBackend::create_for_pid(dir.path(), 1).unwrap();

        backend.module_created(1, "cpu0", "processor").unwrap();
        backend.port_created(2, "data").unwrap();
        backend.process_created(3, "top.run", ProcKind::Thread).unwrap();
        backend.channel_created(4, "sig,a", "sc_signal").unwrap();
        backend.finish().unwrap();

        assert_eq!(read(&backend, Table::Modules), "1,cpu0,processor\n");
        assert_eq!(read(&backend, Table::Ports), "2,data\n");
        assert_eq!(read(&backend, Table::Processes), "3,top.run,THREAD\n");
        assert_eq!(read(&backend, Table::Channels), "4,sig\\,a,sc_signal\n");
    }

    #[test]
    fn test_log_lines() {
        let dir = tempdir().unwrap();
        let mut backend = CsvBackend::create_for_pid(dir.path(), 1).unwrap();

        backend.process_start(5, 100, 2000).unwrap();
        backend.process_yield(5, 150, 2000).unwrap();
        backend.event_notify_timed(6, 10, 20, 30).unwrap();
        backend.event_cancel(6, 11, 21).unwrap();
        backend.cpu_call_stack(0, 99, 2, 0xDEADBEEF, "memcpy").unwrap();
        backend
            .transaction_trace_bw(8, 7, ProtocolKind::Tlm, "{\"addr\":1,\"len\":4}")
            .unwrap();
        backend.log_message(3, 1, "top.uart", "tx, done").unwrap();
        backend
            .port_bound(1, 2, BindingKind::Normal, ProtocolKind::Gpio)
            .unwrap();
        backend
            .module_phase_started(1, ModulePhase::EndOfElaboration, 42)
            .unwrap();
        backend.finish().unwrap();

        assert_eq!(read(&backend, Table::Sched), "100,START,5,2000\n150,YIELD,5,2000\n");
        assert_eq!(read(&backend, Table::Notify), "10,TIMED,6,20,30\n11,CANCEL,6,21,0\n");
        assert_eq!(read(&backend, Table::CpuStack), "99,0,2,0xdeadbeef,memcpy\n");
        assert_eq!(
            read(&backend, Table::Transactions),
            "7,8,bw,TLM,{\"addr\":1\\,\"len\":4}\n"
        );
        assert_eq!(read(&backend, Table::LogMsg), "3,1,top.uart,tx\\, done\n");
        assert_eq!(read(&backend, Table::Bindings), "1,2,NORMAL,GPIO\n");
        assert_eq!(read(&backend, Table::Elab), "42,START,1,END_OF_ELABORATION\n");
    }

    #[test]
    fn test_meta_line() {
        let dir = tempdir().unwrap();
        let mut backend = CsvBackend::create_for_pid(dir.path(), 1).unwrap();

        let meta = MetaInfo {
            pid: 77,
            path: "/opt/vp,1/sim".to_string(),
            user: "alice".to_string(),
            version: "2.0".to_string(),
            timestamp: 1_700_000_000,
        };
        backend.write_meta(&meta).unwrap();
        backend.finish().unwrap();

        let line = read(&backend, Table::Meta);
        assert_eq!(line, "77,/opt/vp\\,1/sim,alice,2.0,1700000000\n");
        assert_eq!(
            split_fields(line.trim_end()),
            vec!["77", "/opt/vp,1/sim", "alice", "2.0", "1700000000"]
        );
        assert_eq!(backend.write_errors(), 0);
    }
}
