// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::protocol::DEFAULT_MAX_FRAME_SIZE;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    8878
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Connections beyond this many are closed right after accept.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Largest payload accepted or produced, in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Bound on a single write to a peer before it is considered gone.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Reject a START whose name is already registered instead of overwriting.
    #[serde(default)]
    pub reject_duplicate_names: bool,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}
fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}
fn default_send_timeout_ms() -> u64 {
    5000 // 5 seconds
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            max_frame_size: default_max_frame_size(),
            send_timeout_ms: default_send_timeout_ms(),
            reject_duplicate_names: false,
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file and validates it.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Loads the file at `path` if it exists, otherwise falls back to defaults.
    pub fn from_file_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            warn!("Config file '{}' not found, using defaults.", path);
            Ok(Self::default())
        }
    }

    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.max_frame_size == 0 {
            return Err(anyhow!("max_frame_size cannot be 0"));
        }
        if self.max_frame_size > u32::MAX as usize {
            return Err(anyhow!(
                "max_frame_size cannot exceed {} (the length prefix is 32 bits)",
                u32::MAX
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(anyhow!("send_timeout_ms cannot be 0"));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
