//! Unified path management for gchat files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/gchat/             # Config directory
//! └── config.toml              # [gemini] API_KEY, MODEL, ...
//!
//! ~/.local/share/gchat/        # Workspace root (default)
//! ├── conversation.json        # Active conversation
//! ├── conversation.lock        # Advisory writer lock
//! └── history/
//!     └── YYYY-MM-DD.json      # One archived conversation per day
//! ```

use std::path::PathBuf;

const APP_NAME: &str = "gchat";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for gchat_core::GchatError {
    fn from(e: PathError) -> Self {
        gchat_core::GchatError::config(e.to_string())
    }
}

/// Platform paths for gchat (XDG on Linux, the native locations elsewhere).
pub struct GchatPaths;

impl GchatPaths {
    /// Returns the gchat configuration directory (e.g. `~/.config/gchat/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to `config.toml`.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the default workspace root (e.g. `~/.local/share/gchat/`).
    pub fn default_workspace() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }
}

/// File layout inside one workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn active_file(&self) -> PathBuf {
        self.root.join("conversation.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join("conversation.lock")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.root.join("history")
    }

    /// Path of the history entry for `date` (`YYYY-MM-DD`).
    pub fn history_file(&self, date: &str) -> PathBuf {
        self.history_dir().join(format!("{date}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_layout() {
        let layout = WorkspaceLayout::new("/tmp/ws");
        assert_eq!(layout.active_file(), PathBuf::from("/tmp/ws/conversation.json"));
        assert_eq!(
            layout.history_file("2024-05-01"),
            PathBuf::from("/tmp/ws/history/2024-05-01.json")
        );
    }

    #[test]
    fn test_config_file_lives_in_config_dir() {
        if let (Ok(dir), Ok(file)) = (GchatPaths::config_dir(), GchatPaths::config_file()) {
            assert_eq!(file.parent(), Some(dir.as_path()));
            assert!(dir.ends_with("gchat"));
        }
    }
}
