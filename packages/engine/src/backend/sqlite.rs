// packages/engine/src/backend/sqlite.rs
//! SQLite trace store
//!
//! One database per process (`sim.<pid>.db`). Each drain cycle runs inside
//! a single `BEGIN IMMEDIATE` / `COMMIT` transaction, so a batch lands
//! completely or not at all.

use crate::backend::TraceBackend;
use crate::trace::entry::{
    BindingKind, ModulePhase, ProcKind, ProtocolKind, RealTime, SimTime, SubjectId,
};
use crate::trace::meta::MetaInfo;
use crate::utils::errors::{EngineError, Result};
use rusqlite::{params, Connection, Params};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (pid INTEGER PRIMARY KEY, path TEXT, user TEXT, version TEXT, time INTEGER);
CREATE TABLE IF NOT EXISTS modules (id INTEGER PRIMARY KEY, name TEXT, kind TEXT);
CREATE TABLE IF NOT EXISTS processes (id INTEGER PRIMARY KEY, name TEXT, kind INTEGER);
CREATE TABLE IF NOT EXISTS ports (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE IF NOT EXISTS events (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE IF NOT EXISTS channels (id INTEGER PRIMARY KEY, name TEXT, kind TEXT);
CREATE TABLE IF NOT EXISTS elab (id INTEGER PRIMARY KEY AUTOINCREMENT, rt INTEGER, module INTEGER, phase INTEGER, status INTEGER);
CREATE TABLE IF NOT EXISTS sched (id INTEGER PRIMARY KEY AUTOINCREMENT, rt INTEGER, proc INTEGER, status INTEGER, st INTEGER);
CREATE TABLE IF NOT EXISTS notify (id INTEGER PRIMARY KEY AUTOINCREMENT, rt INTEGER, event INTEGER, kind INTEGER, st INTEGER, delay INTEGER);
CREATE TABLE IF NOT EXISTS updates (id INTEGER PRIMARY KEY AUTOINCREMENT, rt INTEGER, channel INTEGER, status INTEGER, st INTEGER);
CREATE TABLE IF NOT EXISTS bindings (id INTEGER PRIMARY KEY AUTOINCREMENT, from_port INTEGER, to_port INTEGER, kind INTEGER, proto INTEGER);
CREATE TABLE IF NOT EXISTS cpuidle (id INTEGER PRIMARY KEY AUTOINCREMENT, st INTEGER, cpu INTEGER, idle INTEGER);
CREATE TABLE IF NOT EXISTS cpustack (id INTEGER PRIMARY KEY AUTOINCREMENT, st INTEGER, cpu INTEGER, level INTEGER, addr INTEGER, sym TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS transactions (id INTEGER PRIMARY KEY AUTOINCREMENT, st INTEGER, port INTEGER, dir INTEGER, proto INTEGER, json TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS logmsg (id INTEGER PRIMARY KEY AUTOINCREMENT, st INTEGER, loglvl INTEGER, sender TEXT NOT NULL, msg TEXT NOT NULL);
"#;

const INSERT_META: &str =
    "INSERT OR REPLACE INTO meta (pid, path, user, version, time) VALUES (?1, ?2, ?3, ?4, ?5)";
const INSERT_MODULE: &str = "INSERT INTO modules (id, name, kind) VALUES (?1, ?2, ?3)";
const INSERT_PROCESS: &str = "INSERT INTO processes (id, name, kind) VALUES (?1, ?2, ?3)";
const INSERT_PORT: &str = "INSERT INTO ports (id, name) VALUES (?1, ?2)";
const INSERT_EVENT: &str = "INSERT INTO events (id, name) VALUES (?1, ?2)";
const INSERT_CHANNEL: &str = "INSERT INTO channels (id, name, kind) VALUES (?1, ?2, ?3)";
const INSERT_ELAB: &str =
    "INSERT INTO elab (rt, module, phase, status) VALUES (?1, ?2, ?3, ?4)";
const INSERT_SCHED: &str = "INSERT INTO sched (rt, proc, status, st) VALUES (?1, ?2, ?3, ?4)";
const INSERT_NOTIFY: &str =
    "INSERT INTO notify (rt, event, kind, st, delay) VALUES (?1, ?2, ?3, ?4, ?5)";
const INSERT_UPDATE: &str =
    "INSERT INTO updates (rt, channel, status, st) VALUES (?1, ?2, ?3, ?4)";
const INSERT_BINDING: &str =
    "INSERT INTO bindings (from_port, to_port, kind, proto) VALUES (?1, ?2, ?3, ?4)";
const INSERT_CPUIDLE: &str = "INSERT INTO cpuidle (st, cpu, idle) VALUES (?1, ?2, ?3)";
const INSERT_CPUSTACK: &str =
    "INSERT INTO cpustack (st, cpu, level, addr, sym) VALUES (?1, ?2, ?3, ?4, ?5)";
const INSERT_TRANSACTION: &str =
    "INSERT INTO transactions (st, port, dir, proto, json) VALUES (?1, ?2, ?3, ?4, ?5)";
const INSERT_LOGMSG: &str =
    "INSERT INTO logmsg (st, loglvl, sender, msg) VALUES (?1, ?2, ?3, ?4)";

const STATEMENTS: [&str; 15] = [
    INSERT_META,
    INSERT_MODULE,
    INSERT_PROCESS,
    INSERT_PORT,
    INSERT_EVENT,
    INSERT_CHANNEL,
    INSERT_ELAB,
    INSERT_SCHED,
    INSERT_NOTIFY,
    INSERT_UPDATE,
    INSERT_BINDING,
    INSERT_CPUIDLE,
    INSERT_CPUSTACK,
    INSERT_TRANSACTION,
    INSERT_LOGMSG,
];

// status columns
const STARTED: i64 = 0;
const FINISHED: i64 = 1;

// notify.kind
const NOTIFY_IMMEDIATE: i64 = 0;
const NOTIFY_DELTA: i64 = 1;
const NOTIFY_TIMED: i64 = 2;
const NOTIFY_CANCEL: i64 = 3;

// transactions.dir
const DIR_FW: i64 = 0;
const DIR_BW: i64 = 1;

fn storage_err(context: &str, e: rusqlite::Error) -> EngineError {
    EngineError::StorageFailed(format!("{}: {}", context, e))
}

/// SQLite storage backend
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open `sim.<pid>.db` in `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to create directory {:?}: {}", dir, e))
        })?;

        Self::open_at(dir.join(format!("sim.{}.db", std::process::id())))
    }

    /// Open (or create) the database at an explicit path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| storage_err("Failed to open database", e))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| storage_err("Schema creation failed", e))?;

        conn.set_prepared_statement_cache_capacity(STATEMENTS.len() + 1);
        for sql in STATEMENTS {
            conn.prepare_cached(sql)
                .map_err(|e| storage_err("Statement preparation failed", e))?;
        }

        info!("SQLite trace store opened at {:?}", path);

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only access for inspection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn execute<P: Params>(&self, sql: &str, params: P) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| storage_err("Statement preparation failed", e))?;
        stmt.execute(params)
            .map_err(|e| storage_err("Insert failed", e))?;
        Ok(())
    }
}

impl TraceBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn begin(&mut self, batch_size: usize) -> Result<()> {
        debug!("Opening transaction for {} entries", batch_size);
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| storage_err("Failed to begin transaction", e))
    }

    fn end(&mut self, _batch_size: usize) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| storage_err("Failed to commit transaction", e))
    }

    fn write_meta(&mut self, meta: &MetaInfo) -> Result<()> {
        self.execute(
            INSERT_META,
            params![meta.pid, meta.path, meta.user, meta.version, meta.timestamp],
        )
    }

    fn module_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()> {
        self.execute(INSERT_MODULE, params![id as i64, name, kind])
    }

    fn process_created(&mut self, id: SubjectId, name: &str, kind: ProcKind) -> Result<()> {
        self.execute(INSERT_PROCESS, params![id as i64, name, kind.code()])
    }

    fn port_created(&mut self, id: SubjectId, name: &str) -> Result<()> {
        self.execute(INSERT_PORT, params![id as i64, name])
    }

    fn event_created(&mut self, id: SubjectId, name: &str) -> Result<()> {
        self.execute(INSERT_EVENT, params![id as i64, name])
    }

    fn channel_created(&mut self, id: SubjectId, name: &str, kind: &str) -> Result<()> {
        self.execute(INSERT_CHANNEL, params![id as i64, name, kind])
    }

    fn port_bound(
        &mut self,
        from: SubjectId,
        to: SubjectId,
        binding: BindingKind,
        protocol: ProtocolKind,
    ) -> Result<()> {
        self.execute(
            INSERT_BINDING,
            params![from as i64, to as i64, binding.code(), protocol.code()],
        )
    }

    fn module_phase_started(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()> {
        self.execute(INSERT_ELAB, params![rt as i64, id as i64, phase.code(), STARTED])
    }

    fn module_phase_finished(&mut self, id: SubjectId, phase: ModulePhase, rt: RealTime) -> Result<()> {
        self.execute(INSERT_ELAB, params![rt as i64, id as i64, phase.code(), FINISHED])
    }

    fn process_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.execute(INSERT_SCHED, params![rt as i64, id as i64, STARTED, st as i64])
    }

    fn process_yield(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.execute(INSERT_SCHED, params![rt as i64, id as i64, FINISHED, st as i64])
    }

    fn event_notify_immediate(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.execute(
            INSERT_NOTIFY,
            params![rt as i64, id as i64, NOTIFY_IMMEDIATE, st as i64, 0i64],
        )
    }

    fn event_notify_delta(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.execute(
            INSERT_NOTIFY,
            params![rt as i64, id as i64, NOTIFY_DELTA, st as i64, 0i64],
        )
    }

    fn event_notify_timed(
        &mut self,
        id: SubjectId,
        rt: RealTime,
        st: SimTime,
        delay: SimTime,
    ) -> Result<()> {
        self.execute(
            INSERT_NOTIFY,
            params![rt as i64, id as i64, NOTIFY_TIMED, st as i64, delay as i64],
        )
    }

    fn event_cancel(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.execute(
            INSERT_NOTIFY,
            params![rt as i64, id as i64, NOTIFY_CANCEL, st as i64, 0i64],
        )
    }

    fn channel_update_start(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.execute(INSERT_UPDATE, params![rt as i64, id as i64, STARTED, st as i64])
    }

    fn channel_update_complete(&mut self, id: SubjectId, rt: RealTime, st: SimTime) -> Result<()> {
        self.execute(INSERT_UPDATE, params![rt as i64, id as i64, FINISHED, st as i64])
    }

    fn cpu_idle_enter(&mut self, id: SubjectId, st: SimTime) -> Result<()> {
        self.execute(INSERT_CPUIDLE, params![st as i64, id as i64, 1i64])
    }

    fn cpu_idle_leave(&mut self, id: SubjectId, st: SimTime) -> Result<()> {
        self.execute(INSERT_CPUIDLE, params![st as i64, id as i64, 0i64])
    }

    fn cpu_call_stack(
        &mut self,
        id: SubjectId,
        st: SimTime,
        level: u32,
        address: u64,
        symbol: &str,
    ) -> Result<()> {
        self.execute(
            INSERT_CPUSTACK,
            params![st as i64, id as i64, level, address as i64, symbol],
        )
    }

    fn transaction_trace_fw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()> {
        self.execute(
            INSERT_TRANSACTION,
            params![st as i64, id as i64, DIR_FW, protocol.code(), payload],
        )
    }

    fn transaction_trace_bw(
        &mut self,
        id: SubjectId,
        st: SimTime,
        protocol: ProtocolKind,
        payload: &str,
    ) -> Result<()> {
        self.execute(
            INSERT_TRANSACTION,
            params![st as i64, id as i64, DIR_BW, protocol.code(), payload],
        )
    }

    fn log_message(&mut self, st: SimTime, level: i32, sender: &str, message: &str) -> Result<()> {
        self.execute(INSERT_LOGMSG, params![st as i64, level, sender, message])
    }
}
