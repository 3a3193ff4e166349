//! Configuration contract.
//!
//! The key/value store itself lives outside the core; this module only
//! defines how values are looked up and turned into typed settings.

use crate::error::{GchatError, Result};
use std::str::FromStr;
use std::time::Duration;

/// Section every gchat key is stored under.
pub const SECTION: &str = "gemini";

/// Recognised configuration keys.
pub mod keys {
    pub const MODEL: &str = "MODEL";
    pub const API_KEY: &str = "API_KEY";
    pub const MAX_TOKENS: &str = "MAX_TOKENS";
    pub const TEMPERATURE: &str = "TEMPERATURE";
    pub const TOP_P: &str = "TOP_P";
    pub const TOP_K: &str = "TOP_K";
    pub const CONVERSATION_HISTORY_MAX: &str = "CONVERSATION_HISTORY_MAX";
    pub const HISTORY_RETENTION_DAYS: &str = "HISTORY_RETENTION_DAYS";
    pub const SYSTEM_PROMPT: &str = "SYSTEM_PROMPT";
    pub const ENDPOINT: &str = "ENDPOINT";
    pub const TIMEOUT_SECS: &str = "TIMEOUT_SECS";
    pub const CONNECT_TIMEOUT_SECS: &str = "CONNECT_TIMEOUT_SECS";
    pub const LOCK_TIMEOUT_MS: &str = "LOCK_TIMEOUT_MS";
}

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_TOP_P: f64 = 0.9;
pub const DEFAULT_TOP_K: u32 = 40;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Read-only typed access to an external key/value store.
pub trait ConfigReader: Send + Sync {
    /// Returns the raw value for `key` in `section`, if set.
    fn get(&self, section: &str, key: &str) -> Option<String>;
}

/// Looks up `key` in the gchat section, treating blank values as unset.
pub fn get_string(config: &dyn ConfigReader, key: &str) -> Option<String> {
    config
        .get(SECTION, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Looks up and parses `key`, falling back to `default` when unset.
///
/// A value that is present but does not parse is a configuration error.
pub fn get_parsed<T>(config: &dyn ConfigReader, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_string(config, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| GchatError::config(format!("{key} has invalid value '{raw}': {e}"))),
        None => Ok(default),
    }
}

/// Returns the API key, rejecting missing and template placeholder values.
pub fn api_key(config: &dyn ConfigReader) -> Result<String> {
    let key = get_string(config, keys::API_KEY)
        .ok_or_else(|| GchatError::config("API_KEY is not set"))?;
    if is_placeholder_key(&key) {
        return Err(GchatError::config(
            "API_KEY is still a placeholder; set a real Gemini API key",
        ));
    }
    Ok(key)
}

fn is_placeholder_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("your")
        || lower == "changeme"
        || lower.contains("api_key_here")
        || lower.starts_with('<')
}

/// Sampling and model parameters sent with each request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    pub system_prompt: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            system_prompt: None,
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &dyn ConfigReader) -> Result<Self> {
        Ok(Self {
            model: get_string(config, keys::MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: get_parsed(config, keys::TEMPERATURE, DEFAULT_TEMPERATURE)?,
            max_tokens: get_parsed(config, keys::MAX_TOKENS, DEFAULT_MAX_TOKENS)?,
            top_p: get_parsed(config, keys::TOP_P, DEFAULT_TOP_P)?,
            top_k: get_parsed(config, keys::TOP_K, DEFAULT_TOP_K)?,
            system_prompt: get_string(config, keys::SYSTEM_PROMPT),
        })
    }
}

/// Settings governing the on-disk conversation log.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// Retention ceiling for the active conversation
    pub history_max: usize,
    /// Default age limit used by cleanup
    pub retention_days: i64,
    /// How long a writer waits for the workspace lock
    pub lock_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            history_max: crate::conversation::DEFAULT_HISTORY_MAX,
            retention_days: DEFAULT_RETENTION_DAYS,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl StoreSettings {
    pub fn from_config(config: &dyn ConfigReader) -> Result<Self> {
        let defaults = Self::default();
        let history_max: usize =
            get_parsed(config, keys::CONVERSATION_HISTORY_MAX, defaults.history_max)?;
        if history_max == 0 {
            return Err(GchatError::config(
                "CONVERSATION_HISTORY_MAX must be at least 1",
            ));
        }
        Ok(Self {
            history_max,
            retention_days: get_parsed(
                config,
                keys::HISTORY_RETENTION_DAYS,
                defaults.retention_days,
            )?,
            lock_timeout: Duration::from_millis(get_parsed(
                config,
                keys::LOCK_TIMEOUT_MS,
                DEFAULT_LOCK_TIMEOUT_MS,
            )?),
        })
    }
}
