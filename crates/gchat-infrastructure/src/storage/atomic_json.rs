//! Atomic JSON file operations.
//!
//! Every write goes to a hidden temporary file in the target's directory,
//! is fsynced, and is then renamed over the target. A crash at any point
//! leaves either the old document or the new one, never a torn file.

use super::error::AtomicJsonError;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A handle to a JSON document replaced atomically on save.
///
/// Provides:
/// - **Atomicity**: Updates are all-or-nothing via tmp file + atomic rename
/// - **Durability**: Explicit fsync before rename
///
/// Isolation between processes is the caller's job (see [`super::FileLock`]);
/// a single lock usually guards several files at once.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

/// A fully written temporary file waiting to be renamed over its target.
#[derive(Debug)]
pub struct StagedWrite {
    tmp_path: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Renames the staged file over the target.
    pub fn commit(self) -> Result<(), AtomicJsonError> {
        fs::rename(&self.tmp_path, &self.target)?;
        Ok(())
    }
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads and deserializes the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicJsonError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let data = serde_json::from_str(&content).map_err(|e| AtomicJsonError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(Some(data))
    }

    /// Saves data atomically.
    pub fn save(&self, data: &T) -> Result<(), AtomicJsonError> {
        self.stage(data)?.commit()
    }

    /// Writes `data` to the temporary file without touching the target.
    pub fn stage(&self, data: &T) -> Result<StagedWrite, AtomicJsonError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut json = serde_json::to_vec_pretty(data).map_err(|e| AtomicJsonError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        json.push(b'\n');

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(&json)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        Ok(StagedWrite {
            tmp_path,
            target: self.path.clone(),
        })
    }

    /// Removes the document if present.
    pub fn remove(&self) -> Result<bool, AtomicJsonError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicJsonError> {
        let parent = self.path.parent().ok_or_else(|| {
            AtomicJsonError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;

        let file_name = self.path.file_name().ok_or_else(|| {
            AtomicJsonError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no file name",
            ))
        })?;

        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(parent.join(tmp_name))
    }
}
