//! Configuration management for the GoCD client
//!
//! Server location, credential sources and polling defaults, loaded from
//! `.gocd/config.toml` in the working directory.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{GocdError, Result};

/// Client configuration
///
/// Loaded from `.gocd/config.toml`. Every field has a default so a partial
/// file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GocdConfig {
    /// Server connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Polling defaults for the wait helpers
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server, without the `/go` suffix
    #[serde(default = "default_url")]
    pub url: String,

    /// Environment variable holding a personal access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Environment variable holding the basic auth username
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Environment variable holding the basic auth password
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Polling defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between two probes
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Seconds before a wait gives up
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8153".to_string()
}

fn default_token_env() -> String {
    "GOCD_TOKEN".to_string()
}

fn default_username_env() -> String {
    "GOCD_USERNAME".to_string()
}

fn default_password_env() -> String {
    "GOCD_PASSWORD".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_timeout() -> u64 {
    600
}

impl GocdConfig {
    /// Load configuration from `.gocd/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".gocd/config.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            GocdError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write default configuration to `.gocd/config.toml`
    pub fn write_default(root: &Path) -> Result<()> {
        let config_dir = root.join(".gocd");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| GocdError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Override the server URL (CLI flag takes precedence over the file)
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.server.url = url.into();
        self
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.server.url.trim_end_matches('/')
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GocdConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token_env: default_token_env(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_secs: default_poll_timeout(),
        }
    }
}
