//! Configuration management for the CLI

use anyhow::{Context, Result};
use ontime_lib::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service URL used when neither flag, env var nor config file sets one
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// API endpoint URL
    pub api_url: Option<String>,
    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("ontime").join("config.json"))
    }

    /// Flag or env var first, then the config file, then the default
    pub fn resolve_api_url(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }
}

/// Training configuration from an optional TOML file.
///
/// Unset keys keep their defaults.
pub fn load_training_config(path: Option<&Path>) -> Result<TrainingConfig> {
    let Some(path) = path else {
        return Ok(TrainingConfig::default());
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .build()
        .with_context(|| format!("Failed to read training config {:?}", path))?;

    settings
        .try_deserialize()
        .with_context(|| format!("Invalid training config {:?}", path))
}
