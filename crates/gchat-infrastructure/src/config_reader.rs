//! `ConfigReader` implementations.
//!
//! - [`TomlConfigReader`]: `~/.config/gchat/config.toml`
//! - [`MemoryConfig`]: in-process overrides (CLI flags, env vars, tests)
//! - [`LayeredConfig`]: first reader that has a value wins

use gchat_core::config::{ConfigReader, SECTION};
use gchat_core::{GchatError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reads sections and keys from a TOML file, loaded once at construction.
///
/// ```toml
/// [gemini]
/// API_KEY = "..."
/// MODEL = "gemini-2.0-flash"
/// TEMPERATURE = 0.7
/// ```
///
/// Scalars of any TOML type are surfaced as strings; arrays and tables are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct TomlConfigReader {
    sections: HashMap<String, HashMap<String, String>>,
}

impl TomlConfigReader {
    /// Loads `path`. A missing file yields an empty config.
    ///
    /// # Errors
    ///
    /// Returns `GchatError::Config` if the file exists but is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| GchatError::config(format!("{}: {}", path.display(), e)))
    }

    /// Parses TOML text directly.
    pub fn parse(content: &str) -> Result<Self> {
        let root: toml::Table = toml::from_str(content)?;
        let mut sections = HashMap::new();

        for (section, value) in root {
            let toml::Value::Table(table) = value else {
                continue;
            };
            let entries = table
                .into_iter()
                .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key, v)))
                .collect();
            sections.insert(section, entries);
        }

        Ok(Self { sections })
    }
}

fn scalar_to_string(value: toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

impl ConfigReader for TomlConfigReader {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }
}

/// A plain in-memory key/value store.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    values: HashMap<(String, String), String>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` in the gchat section.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(SECTION, key, value);
        self
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.values
            .insert((section.to_string(), key.to_string()), value.into());
    }
}

impl ConfigReader for MemoryConfig {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }
}

/// Consults each layer in order and returns the first value found.
#[derive(Default)]
pub struct LayeredConfig {
    layers: Vec<Box<dyn ConfigReader>>,
}

impl LayeredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer with lower priority than all existing ones.
    pub fn push(mut self, layer: impl ConfigReader + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }
}

impl ConfigReader for LayeredConfig {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(section, key))
    }
}
