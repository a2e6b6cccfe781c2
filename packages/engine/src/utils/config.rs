// packages/engine/src/utils/config.rs
//! Engine configuration
//!
//! Settings are layered from an optional `simtrace.{toml,yaml,json}` file and
//! `SIMTRACE_*` environment variables. Whether tracing runs at all, and into
//! which backend, is decided by the bare `SIMTRACE` variable:
//!
//! - unset or `"0"`: tracing disabled
//! - contains `"csv"`: delimited-text export
//! - anything else: SQLite database

use crate::utils::errors::{EngineError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that enables tracing and selects the backend
pub const TRACE_ENV_VAR: &str = "SIMTRACE";

/// Value of [`TRACE_ENV_VAR`] that explicitly disables tracing
pub const DISABLED_SENTINEL: &str = "0";

/// Stem of the optional configuration file
pub const CONFIG_FILE_STEM: &str = "simtrace";

/// Persistence strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// One `<table>.<pid>.csv` file per table
    Csv,

    /// One `sim.<pid>.db` SQLite database
    Sqlite,
}

impl BackendKind {
    /// Decide from the options string whether tracing is enabled and which
    /// backend to build.
    pub fn select(options: Option<&str>) -> Option<Self> {
        match options {
            None => None,
            Some(DISABLED_SENTINEL) => None,
            Some(options) if options.contains("csv") => Some(BackendKind::Csv),
            Some(_) => Some(BackendKind::Sqlite),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Csv => "csv",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory receiving the trace artifacts
    pub output_dir: PathBuf,

    /// Initial state of the runtime sampling gate
    pub sampling_enabled: bool,

    /// Install the SIGUSR2 handler that flips the sampling gate
    pub signal_toggle: bool,

    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,

    /// Version string recorded in the meta table (defaults to the engine's)
    pub tool_version: Option<String>,

    /// Producer threads spawned by the demo driver
    pub demo_threads: usize,

    /// Events emitted per producer thread by the demo driver
    pub demo_events: usize,

    /// Raw value of the `SIMTRACE` variable
    #[serde(skip)]
    pub options: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            sampling_enabled: true,
            signal_toggle: true,
            log_level: "info".to_string(),
            tool_version: None,
            demo_threads: 4,
            demo_events: 1000,
            options: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the optional config file and the environment
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE_STEM).required(false))
            .add_source(config::Environment::with_prefix(TRACE_ENV_VAR).try_parsing(true))
            .build()?;

        let mut config: EngineConfig = settings.try_deserialize()?;
        config.options = std::env::var(TRACE_ENV_VAR).ok();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file, ignoring the environment
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Set the options string explicitly
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Backend selected by the options string, `None` when tracing is off
    pub fn backend_kind(&self) -> Option<BackendKind> {
        BackendKind::select(self.options.as_deref())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.demo_threads == 0 {
            return Err(EngineError::ConfigError(
                "demo_threads must be at least 1".to_string(),
            ));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(EngineError::ConfigError(
                "output_dir cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_select_disabled() {
        assert_eq!(BackendKind::select(None), None);
        assert_eq!(BackendKind::select(Some("0")), None);
    }

    #[test]
    fn test_select_csv() {
        assert_eq!(BackendKind::select(Some("csv")), Some(BackendKind::Csv));
        assert_eq!(BackendKind::select(Some("out=csv,fast")), Some(BackendKind::Csv));
    }

    #[test]
    fn test_select_sqlite_fallback() {
        assert_eq!(BackendKind::select(Some("1")), Some(BackendKind::Sqlite));
        assert_eq!(BackendKind::select(Some("sql")), Some(BackendKind::Sqlite));
        assert_eq!(BackendKind::select(Some("")), Some(BackendKind::Sqlite));
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.sampling_enabled);
        assert!(config.signal_toggle);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.backend_kind().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_options() {
        let config = EngineConfig::default().with_options("csv");
        assert_eq!(config.backend_kind(), Some(BackendKind::Csv));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simtrace.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "output_dir = \"/tmp/traces\"").unwrap();
        writeln!(file, "sampling_enabled = false").unwrap();
        writeln!(file, "demo_threads = 8").unwrap();
        drop(file);

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/traces"));
        assert!(!config.sampling_enabled);
        assert_eq!(config.demo_threads, 8);
        // untouched keys keep their defaults
        assert!(config.signal_toggle);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_validation() {
        let invalid = EngineConfig {
            demo_threads: 0,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());
    }
}
