//! Error types for Conductor operations

use crate::config::ConfigError;
use crate::events::EventError;
use crate::executor::ExecutionError;
use crate::middleware::MiddlewareError;
use crate::registry::RegistryError;
use crate::tools::ToolError;

/// Result type for Conductor operations
pub type Result<T> = std::result::Result<T, ConductorError>;

/// Error types for the Conductor runtime
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    /// Component registration or resolution failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Event construction or bus error
    #[error(transparent)]
    Event(#[from] EventError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tool invocation failed
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Middleware failed or rejected an execution
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    /// Execution pipeline error
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ConductorError {
    fn from(s: String) -> Self {
        ConductorError::Other(s)
    }
}

impl From<&str> for ConductorError {
    fn from(s: &str) -> Self {
        ConductorError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ConductorError {
    fn from(err: anyhow::Error) -> Self {
        ConductorError::Other(err.to_string())
    }
}
