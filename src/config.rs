//! Run configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. The path given on the command line
//! 2. `$MBOXPRESS_CONFIG` (environment variable)
//! 3. `~/.config/mboxpress/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxpress\config.toml` (Windows)
//! 4. Built-in defaults
//!
//! The loaded values are turned into explicit [`NormalizeOptions`] passed
//! into the library; there is no process-wide settings object.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults applied to every archive unless overridden per archive.
    pub defaults: DefaultsConfig,
    /// Archives to convert when none are given on the command line.
    pub archives: Vec<ArchiveConfig>,
}

/// Defaults applied to all archives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Suffix appended to every derived author name.
    pub author_suffix: String,
    /// Treat plaintext bodies as Markdown.
    pub markdownify: bool,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// One archive to convert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// mbox file or maildir directory.
    pub path: PathBuf,
    /// Category label applied to every document from this archive.
    pub category: String,
    /// Per-archive override of the author suffix.
    #[serde(default)]
    pub author_suffix: Option<String>,
    /// Per-archive override of the Markdown flag.
    #[serde(default)]
    pub markdownify: Option<bool>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            author_suffix: "via email".to_string(),
            markdownify: false,
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl ArchiveConfig {
    /// Resolve this archive's effective normalization options.
    pub fn options(&self, defaults: &DefaultsConfig) -> NormalizeOptions {
        NormalizeOptions {
            category: self.category.clone(),
            author_suffix: self
                .author_suffix
                .clone()
                .unwrap_or_else(|| defaults.author_suffix.clone()),
            markdownify: self.markdownify.unwrap_or(defaults.markdownify),
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    if let Some(path) = explicit.map(Path::to_path_buf).or_else(config_file_path) {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXPRESS_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxpress").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.defaults.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxpress")
}
