//! Configuration management

use crate::error::ConsoleResult;
use crate::logging::LoggingConfig;
use crate::config_error;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level console configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend; endpoint paths are appended under `/services`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers sent with every request
    pub headers: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
            user_agent: "adminkit/0.1".to_string(),
            headers: HashMap::new(),
        }
    }
}

/// Where the persisted session lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub session_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            session_dir: base.join("adminkit").join("session"),
        }
    }
}

impl ConsoleConfig {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adminkit")
            .join("config.toml")
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConsoleResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| config_error!(format!("Failed to read config file: {}", e), "read_file", e))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> ConsoleResult<Self> {
        let config: ConsoleConfig = toml::from_str(content)
            .map_err(|e| config_error!(format!("Failed to parse config: {}", e), "parse_toml", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConsoleResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            config_error!(format!("Failed to serialize config: {}", e), "serialize_toml", e)
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path.as_ref(), content)
            .map_err(|e| config_error!(format!("Failed to write config file: {}", e), "write_file", e))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConsoleResult<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| {
            config_error!(
                format!("Invalid api.base_url '{}': {}", self.api.base_url, e),
                "validate",
                e
            )
        })?;

        if self.api.timeout_seconds == 0 {
            return Err(config_error!(
                "api.timeout_seconds must be greater than 0",
                "validate"
            ));
        }

        if self.api.user_agent.trim().is_empty() {
            return Err(config_error!("api.user_agent must not be empty", "validate"));
        }

        Ok(())
    }
}
