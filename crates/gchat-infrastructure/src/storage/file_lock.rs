//! Advisory cross-process lock with a bounded wait.

use super::error::AtomicJsonError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A file lock guard that releases the lock when dropped.
///
/// The lock file itself is left on disk: removing it would let a waiter
/// and a newcomer lock two different inodes.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquires an exclusive lock on `lock_path`, polling until `timeout`.
    ///
    /// # Returns
    ///
    /// - `Ok(FileLock)`: Lock held until the guard is dropped
    /// - `Err(AtomicJsonError::LockTimeout)`: Another holder kept it too long
    /// - `Err`: The lock file could not be opened or locked
    pub fn acquire(lock_path: &Path, timeout: Duration) -> Result<Self, AtomicJsonError> {
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock { file });
                }
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        tracing::warn!(
                            path = %lock_path.display(),
                            waited_ms = waited.as_millis() as u64,
                            "gave up waiting for conversation lock"
                        );
                        return Err(AtomicJsonError::LockTimeout {
                            path: lock_path.to_path_buf(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
                }
                Err(e) => {
                    return Err(AtomicJsonError::LockError(format!(
                        "Failed to acquire lock on {}: {}",
                        lock_path.display(),
                        e
                    )));
                }
            }
        }
    }

}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock anyway.
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
