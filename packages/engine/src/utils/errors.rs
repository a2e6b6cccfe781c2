// packages/engine/src/utils/errors.rs
//! Engine error types

use thiserror::Error;

/// Errors raised by the trace engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Backend storage failed (open, prepare, bind, step, commit)
    #[error("storage failed: {0}")]
    StorageFailed(String),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The recording pipeline itself failed (writer thread, lifecycle misuse)
    #[error("recording failed: {0}")]
    RecordingFailed(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = EngineError::StorageFailed("disk full".to_string());
        assert_eq!(err.to_string(), "storage failed: disk full");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::IoError(_)));
    }
}
