//! Configuration management for the remoting demo.
//!
//! Settings are read from a TOML file. A missing file is created with the
//! defaults so the next run has something to edit.

use member_remoting::RemotingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_instance_id() -> String {
    "track-1".to_string()
}

fn default_iterations() -> u32 {
    5
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_host_endpoint() -> String {
    "host".to_string()
}

fn default_client_endpoint() -> String {
    "client".to_string()
}

/// Top-level demo configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Settings passed to both links
    #[serde(default)]
    pub remoting: RemotingConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub demo: DemoSettings,
}

/// Logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// The scripted session the demo drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoSettings {
    /// Instance id registered on both links
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    /// Number of host/client exchanges to run
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Pause between exchanges
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_host_endpoint")]
    pub host_endpoint: String,
    #[serde(default = "default_client_endpoint")]
    pub client_endpoint: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            iterations: default_iterations(),
            tick_interval_ms: default_tick_interval_ms(),
            host_endpoint: default_host_endpoint(),
            client_endpoint: default_client_endpoint(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        self.remoting.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if self.demo.instance_id.is_empty() {
            return Err("demo.instance_id cannot be empty".to_string());
        }

        if self.demo.host_endpoint.is_empty() || self.demo.client_endpoint.is_empty() {
            return Err("demo endpoints cannot be empty".to_string());
        }

        if self.demo.host_endpoint == self.demo.client_endpoint {
            return Err(format!(
                "demo.host_endpoint and demo.client_endpoint must differ (both are '{}')",
                self.demo.host_endpoint
            ));
        }

        Ok(())
    }
}
