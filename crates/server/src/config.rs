//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Config file read when `ONTIME_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Artifact bundle produced by `ontime train`
    #[serde(default = "default_bundle_path")]
    pub bundle_path: PathBuf,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Name attached to structured log events
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_bundle_path() -> PathBuf {
    PathBuf::from("models/flight_model.json")
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_service_name() -> String {
    "ontime-server".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bundle_path: default_bundle_path(),
            bind_address: default_bind_address(),
            port: default_port(),
            service_name: default_service_name(),
        }
    }
}

impl ServerConfig {
    /// Load from the optional config file, then `ONTIME_*` environment variables
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("ONTIME_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml).required(false))
            .add_source(config::Environment::with_prefix("ONTIME").try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read configuration from {path}"))?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
