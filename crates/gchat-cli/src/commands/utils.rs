use anyhow::{Context, Result};
use gchat_core::config::keys;
use gchat_core::{ConfigReader, StoreSettings};
use gchat_infrastructure::{ConversationStore, GchatPaths, LayeredConfig, MemoryConfig, TomlConfigReader};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted for the API key when no flag sets it.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Global options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub workspace: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` for gchat crates
/// with `--verbose`.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "warn,gchat_core=debug,gchat_infrastructure=debug,gchat_interaction=debug,gchat_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

pub fn resolve_workspace(options: &GlobalOptions) -> Result<PathBuf> {
    match &options.workspace {
        Some(path) => Ok(path.clone()),
        None => GchatPaths::default_workspace().context("Failed to resolve the default workspace"),
    }
}

/// Layers flag overrides, then `GEMINI_API_KEY`, then the TOML file.
pub fn load_config(options: &GlobalOptions, overrides: MemoryConfig) -> Result<Arc<dyn ConfigReader>> {
    let path = match &options.config {
        Some(path) => path.clone(),
        None => GchatPaths::config_file().context("Failed to resolve the config file path")?,
    };
    let file = TomlConfigReader::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");

    Ok(Arc::new(layer_config(overrides, env::var(API_KEY_ENV).ok(), file)))
}

fn layer_config(overrides: MemoryConfig, env_key: Option<String>, file: TomlConfigReader) -> LayeredConfig {
    let mut environment = MemoryConfig::new();
    if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
        environment = environment.with(keys::API_KEY, key);
    }
    LayeredConfig::new().push(overrides).push(environment).push(file)
}

pub fn open_store(workspace: &Path, config: &dyn ConfigReader) -> Result<ConversationStore> {
    let settings = StoreSettings::from_config(config)?;
    ConversationStore::open(workspace, settings)
        .with_context(|| format!("Failed to open workspace {}", workspace.display()))
}
