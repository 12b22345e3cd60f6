//! Error types for pyscout
//!
//! This module defines the error hierarchy covering:
//! - Interpreter subprocess errors (sys.path discovery)
//! - Parser errors
//! - Module path resolution errors
//! - Configuration and CLI errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors should be actionable - include context about what to do
//! - Per-file errors are recoverable: log, count, and keep scanning

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Top-level error type for the pyscout application
#[derive(Error, Debug)]
pub enum ScanError {
    /// Interpreter subprocess errors
    #[error("python error: {0}")]
    Python(#[from] PythonError),

    /// Parser errors
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Module path resolution errors
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file reads, directory opens)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Outcome channel closed while the driver still expected results
    #[error("result channel closed unexpectedly")]
    ChannelClosed,
}

/// Errors from invoking the Python interpreter
#[derive(Error, Debug)]
pub enum PythonError {
    /// The interpreter could not be started at all
    #[error("failed to execute {interpreter:?}: {source}")]
    SpawnFailed {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The interpreter ran but exited non-zero
    #[error("interpreter exited with {status}: {stderr}")]
    CommandFailed { status: ExitStatus, stderr: String },

    /// The interpreter printed something that was not UTF-8
    #[error("interpreter output was not valid UTF-8")]
    InvalidOutput,
}

/// Errors from the tree parser facade
#[derive(Error, Debug)]
pub enum ParseError {
    /// The parser declined to produce a tree (e.g. cancellation)
    #[error("parser produced no tree")]
    TreeNotFound,

    /// The grammar was rejected by the parser (ABI mismatch)
    #[error("language rejected by parser: {0}")]
    Language(String),
}

/// Errors from module path resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The input path does not name a `.py` source file
    #[error("not a .py file: {0:?}")]
    NotPyFile(PathBuf),
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid per-file size cap
    #[error("invalid max file size {size}: must be at least {min} bytes")]
    InvalidMaxFileSize { size: u64, min: u64 },

    /// Invalid worker stack size
    #[error("invalid stack size {size}: must be at least {min} bytes")]
    InvalidStackSize { size: usize, min: usize },
}

impl ScanError {
    /// Check if this error is recoverable at the per-file level
    /// (log, count, continue) rather than fatal for the whole scan.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScanError::Parse(_) | ScanError::Resolve(_) | ScanError::Io(_)
        )
    }
}

/// Result type alias for ScanError
pub type Result<T> = std::result::Result<T, ScanError>;

/// Result type alias for PythonError
pub type PythonResult<T> = std::result::Result<T, PythonError>;

/// Result type alias for ParseError
pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let resolve_err = ResolveError::NotPyFile(PathBuf::from("/tmp/readme.txt"));
        let scan_err: ScanError = resolve_err.into();
        assert!(matches!(scan_err, ScanError::Resolve(_)));
        assert!(scan_err.is_recoverable());
    }

    #[test]
    fn test_parse_error_recoverable() {
        let err: ScanError = ParseError::TreeNotFound.into();
        assert!(err.is_recoverable());

        let err: ScanError = PythonError::InvalidOutput.into();
        assert!(!err.is_recoverable());
    }
}
