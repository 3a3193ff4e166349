//! Storage layer for atomic file operations.

mod atomic_json;
mod error;
mod file_lock;

pub use atomic_json::{AtomicJsonFile, StagedWrite};
pub use error::AtomicJsonError;
pub use file_lock::FileLock;
