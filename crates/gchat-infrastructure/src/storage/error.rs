//! Errors raised by the storage layer.

use gchat_core::GchatError;
use std::path::PathBuf;

/// Errors that can occur during atomic JSON operations.
#[derive(Debug)]
pub enum AtomicJsonError {
    /// File I/O error.
    Io(std::io::Error),
    /// JSON serialization/deserialization error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The lock stayed busy for the whole wait budget.
    LockTimeout { path: PathBuf, waited_ms: u64 },
    /// File locking failed for a reason other than contention.
    LockError(String),
}

impl std::fmt::Display for AtomicJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicJsonError::Io(e) => write!(f, "I/O error: {}", e),
            AtomicJsonError::Json { path, source } => {
                write!(f, "JSON error in {}: {}", path.display(), source)
            }
            AtomicJsonError::LockTimeout { path, waited_ms } => write!(
                f,
                "Lock on {} still held after {}ms",
                path.display(),
                waited_ms
            ),
            AtomicJsonError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for AtomicJsonError {}

impl From<std::io::Error> for AtomicJsonError {
    fn from(e: std::io::Error) -> Self {
        AtomicJsonError::Io(e)
    }
}

impl From<AtomicJsonError> for GchatError {
    fn from(e: AtomicJsonError) -> Self {
        match e {
            AtomicJsonError::Io(io) => io.into(),
            AtomicJsonError::Json { path, source } => {
                GchatError::parse(format!("{}: {}", path.display(), source))
            }
            AtomicJsonError::LockTimeout { path, waited_ms } => GchatError::LockTimeout {
                path: path.display().to_string(),
                waited_ms,
            },
            AtomicJsonError::LockError(msg) => GchatError::io(msg),
        }
    }
}
