//! Error types for configuration

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An accessor ran before `load()` completed
    #[error("Configuration accessed before load() completed")]
    NotLoaded,

    /// Runtime configuration failed validation or extraction
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// A provider could not read or write its source
    #[error("Config provider '{provider}' failed: {message}")]
    Provider {
        /// Source name
        provider: String,
        /// Failure message
        message: String,
    },

    /// The provider does not implement this operation
    #[error("Config provider '{provider}' does not support {operation}")]
    Unsupported {
        /// Source name
        provider: String,
        /// Operation attempted
        operation: String,
    },

    /// A dotted key cannot be written
    #[error("Invalid config key '{key}': {reason}")]
    InvalidKey {
        /// Key as given
        key: String,
        /// Why it was refused
        reason: String,
    },

    /// A subtree did not deserialize into the requested type
    #[error("Failed to deserialize config key '{key}': {message}")]
    Deserialize {
        /// Key as given, empty for the whole tree
        key: String,
        /// Serde message
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn provider(provider: impl Into<String>, message: impl ToString) -> Self {
        ConfigError::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}
