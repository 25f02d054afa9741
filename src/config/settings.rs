//! TOML settings for the provider process.
//!
//! These describe how the provider runs (logging, connection policy,
//! timeouts). Backend connection parameters do not live here; they arrive
//! through link configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How backend clients are acquired for each operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Connect for every operation and release before it returns
    PerCall,
    /// One lazily created client per configuration, rebuilt when it changes
    #[default]
    Shared,
}

/// Top-level settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// `[logging]` table
    #[serde(default)]
    pub logging: LoggingSettings,
    /// `[backend]` table
    #[serde(default)]
    pub backend: BackendSettings,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Backend client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Whether clients are shared or opened per operation
    #[serde(default)]
    pub connection_mode: ConnectionMode,
    /// Upper bound for a single store operation, in seconds. 0 disables it.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
    /// How long the driver waits for a reachable server, in seconds
    #[serde(default = "default_server_selection_timeout")]
    pub server_selection_timeout_secs: u64,
    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

fn default_operation_timeout() -> u64 {
    30
}

fn default_server_selection_timeout() -> u64 {
    5
}

fn default_app_name() -> String {
    "keyvalue-documentdb".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            connection_mode: ConnectionMode::default(),
            operation_timeout_secs: default_operation_timeout(),
            server_selection_timeout_secs: default_server_selection_timeout(),
            app_name: default_app_name(),
        }
    }
}

impl BackendSettings {
    /// Per-operation timeout, if enabled
    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }

    /// Server selection timeout handed to the driver
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_secs)
    }
}

/// Loads provider settings from a TOML file.
#[derive(Debug)]
pub struct SettingsLoader {
    /// File the settings were read from, or would have been
    pub settings_path: PathBuf,
    /// Loaded settings
    pub settings: ProviderSettings,
}

impl SettingsLoader {
    /// Load settings.
    ///
    /// # Arguments
    /// * `settings_path` - Path to TOML settings. If None, uses `config/keyvalue.toml`.
    ///   A missing file yields the defaults.
    pub fn new(settings_path: Option<&Path>) -> Result<Self> {
        let settings_path = settings_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/keyvalue.toml"));

        let settings = if settings_path.exists() {
            Self::load_settings(&settings_path)?
        } else {
            ProviderSettings::default()
        };

        Ok(Self {
            settings_path,
            settings,
        })
    }

    fn load_settings(path: &Path) -> Result<ProviderSettings> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML settings: {}", path.display()))
    }
}
