//! Error types for gchat.

use thiserror::Error;

/// A shared error type for every gchat crate.
///
/// Each variant corresponds to one failure class of a chat turn or a
/// conversation-log operation. Network failures are split into
/// `Transport` (never reached the provider or the connection died) and
/// `Api` (the provider answered with an error object) so callers can decide
/// on their own retry policy.
#[derive(Error, Debug, Clone)]
pub enum GchatError {
    /// Missing/placeholder API key or an unparseable numeric setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request payload could not be assembled (e.g. bad schema file)
    #[error("Build error: {0}")]
    Build(String),

    /// An attachment could not be read for Base64 encoding
    #[error("Encoding error: {path}: {message}")]
    Encoding { path: String, message: String },

    /// Connection refused, timeout, or the stream closed early
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider returned a structured error object
    #[error("API error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// Malformed JSON, either on disk or in a non-streaming response
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Another process held the conversation lock for too long
    #[error("Timed out after {waited_ms}ms waiting for lock on {path}")]
    LockTimeout { path: String, waited_ms: u64 },

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A date argument that is not `YYYY-MM-DD`
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// The caller cancelled an in-flight turn
    #[error("Cancelled")]
    Cancelled,
}

impl GchatError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Build error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an Api error
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether a caller may reasonably retry the same turn.
    ///
    /// Only transport failures qualify; the core itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for GchatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for GchatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(format!("JSON - {err}"))
    }
}

impl From<toml::de::Error> for GchatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML - {err}"))
    }
}

/// A type alias for `Result<T, GchatError>`.
pub type Result<T> = std::result::Result<T, GchatError>;
