//! Runtime settings for a [`Conductor`](crate::runtime::Conductor)

use super::error::ConfigError;
use crate::events::EventBusConfig;
use crate::middleware::{CacheConfig, CircuitBreakerConfig, ValidationConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Environment variable naming an extra TOML file
pub const CONFIG_PATH_ENV: &str = "CONDUCTOR_CONFIG_PATH";

/// Default configuration file
pub const DEFAULT_CONFIG_FILE: &str = "conductor.toml";

/// Settings for the bus, the registry and the standard middleware stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConductorConfig {
    /// Event bus settings
    #[serde(default)]
    pub event_bus: EventBusConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Circuit breaker settings
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Logging middleware settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging middleware configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for execution logs (`trace`, `debug`, `info`, `warn`, `error`)
    #[serde(default = "default_level")]
    pub level: String,

    /// Log inputs and metadata
    #[serde(default)]
    pub include_context: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            include_context: false,
        }
    }
}

impl LoggingConfig {
    /// Parsed level
    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

impl ConductorConfig {
    /// Load configuration from defaults, files and the environment
    ///
    /// Loads in this order, later layers overriding earlier ones:
    /// 1. Built-in defaults
    /// 2. `conductor.toml` in the working directory
    /// 3. The file named by `CONDUCTOR_CONFIG_PATH`, if set
    /// 4. `CONDUCTOR_` environment variables, `__` separating sections
    ///    (`CONDUCTOR_CACHE__MAX_ENTRIES=500`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a layer fails to parse or the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(ConductorConfig::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }

        let config: ConductorConfig = figment
            .merge(Env::prefixed("CONDUCTOR_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Invalid(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from one TOML file over the defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the file cannot be parsed or the
    /// result fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: ConductorConfig = Figment::new()
            .merge(Serialized::defaults(ConductorConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                ConfigError::Invalid(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_bus.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_bus.history_capacity must be at least 1".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        self.logging.tracing_level()?;
        Ok(())
    }
}
