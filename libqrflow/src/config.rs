//! Configuration management for Qrflow

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::DefaultsProvider;
use crate::error::{ConfigError, Result};
use crate::machine::ContextDefaults;

/// Quiet period after the last keystroke before input is considered settled
pub const DEFAULT_DEBOUNCE_MS: u64 = 800;
/// Auto-generate delay when a validation result is present
pub const DEFAULT_POST_VALIDATION_DELAY_MS: u64 = 1000;
/// Auto-generate delay when no validation took place
pub const DEFAULT_AUTO_GENERATION_DELAY_MS: u64 = 1500;
pub const DEFAULT_VALIDATION_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 10000;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3004";
pub const DEFAULT_VALIDATE_PATH: &str = "/api/validate/check-url";
pub const DEFAULT_GENERATE_PATH: &str = "/api/generate";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "QRFLOW_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub behavior: BehaviorConfig,
    pub backend: BackendConfig,
    pub defaults: ContextDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub debounce_ms: u64,
    pub post_validation_delay_ms: u64,
    pub auto_generation_delay_ms: u64,
    pub validation_timeout_ms: u64,
    pub generation_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            post_validation_delay_ms: DEFAULT_POST_VALIDATION_DELAY_MS,
            auto_generation_delay_ms: DEFAULT_AUTO_GENERATION_DELAY_MS,
            validation_timeout_ms: DEFAULT_VALIDATION_TIMEOUT_MS,
            generation_timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
        }
    }
}

impl TimingConfig {
    pub fn post_validation_delay(&self) -> Duration {
        Duration::from_millis(self.post_validation_delay_ms)
    }

    pub fn auto_generation_delay(&self) -> Duration {
        Duration::from_millis(self.auto_generation_delay_ms)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Generate automatically once input settles in `ready`
    pub auto_generate: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self { auto_generate: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub validate_path: String,
    pub generate_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            validate_path: DEFAULT_VALIDATE_PATH.to_string(),
            generate_path: DEFAULT_GENERATE_PATH.to_string(),
        }
    }
}

impl BackendConfig {
    pub fn validate_url(&self) -> String {
        join_url(&self.base_url, &self.validate_path)
    }

    pub fn generate_url(&self) -> String {
        join_url(&self.base_url, &self.generate_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load from the default location, or fall back to defaults when no
    /// file exists there
    pub fn load_or_default() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default_config());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Reject values the coordinator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.timing.debounce_ms == 0 {
            return Err(
                ConfigError::InvalidValue("timing.debounce_ms must be greater than 0".to_string())
                    .into(),
            );
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(
                ConfigError::InvalidValue("backend.base_url must not be empty".to_string()).into(),
            );
        }
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("qrflow").join("config.toml"))
}

/// Defaults provider backed by the `[defaults]` section of a [`Config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigDefaults {
    defaults: ContextDefaults,
}

impl ConfigDefaults {
    pub fn new(defaults: ContextDefaults) -> Self {
        Self { defaults }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.defaults.clone())
    }
}

#[async_trait]
impl DefaultsProvider for ConfigDefaults {
    async fn load_defaults(&self) -> Result<ContextDefaults> {
        Ok(self.defaults.clone())
    }
}
