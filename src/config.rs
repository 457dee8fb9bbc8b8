//! Configuration loading.
//!
//! Every section of `bondprompt.toml` is optional. A missing file means
//! defaults; a present but malformed file is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::prompts::TemplateRegistry;
use crate::providers::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};

/// Config file name inside [`config_dir`].
pub const CONFIG_FILE_NAME: &str = "bondprompt.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// External text generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Template override sources.
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External text generator (Ollama) settings.
#[derive(Debug, Deserialize)]
pub struct GeneratorConfig {
    /// Ollama base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total generator calls per parse when recovery fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl GeneratorConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Where to load template overrides from.
#[derive(Debug, Default, Deserialize)]
pub struct TemplatesConfig {
    /// Directory of `*.toml` template files.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// JSON file mapping template id to body.
    #[serde(default)]
    pub import: Option<PathBuf>,
}

/// Log output settings.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Directory for JSON log files; stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Filter directive used when `RUST_LOG` is unset, e.g. `debug` or
    /// `bondprompt::recovery=trace,info`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: default_log_level(),
        }
    }
}

// Default value functions for serde

fn default_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_owned()
}
fn default_model() -> String {
    DEFAULT_OLLAMA_MODEL.to_owned()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_owned()
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Load an explicit config, else `~/.bondprompt/bondprompt.toml` if it
/// exists, else defaults.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed,
/// or if an explicit path does not exist.
pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match config_dir() {
        Ok(dir) => {
            let path = dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                return load_config(&path);
            }
            debug!(path = %path.display(), "no config file, using defaults");
        }
        Err(e) => debug!(error = %e, "no home directory, using defaults"),
    }
    Ok(Config::default())
}

/// Resolve the default config directory (`~/.bondprompt/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".bondprompt"))
}

/// Build the template registry: catalog defaults, then directory
/// overrides, then a JSON import.
///
/// # Errors
///
/// Returns an error if a configured template source cannot be loaded.
pub fn build_registry(templates: &TemplatesConfig) -> anyhow::Result<TemplateRegistry> {
    let mut registry = TemplateRegistry::with_defaults();
    if let Some(dir) = &templates.dir {
        registry
            .load_dir(dir)
            .with_context(|| format!("failed to load templates from {}", dir.display()))?;
    }
    if let Some(file) = &templates.import {
        registry
            .import_from_file(file)
            .with_context(|| format!("failed to import templates from {}", file.display()))?;
    }
    Ok(registry)
}
