//! Error types for registry operations

use crate::tools::ToolError;
use thiserror::Error;

/// Registry specific errors
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A tool with this name is already registered
    #[error("Tool '{0}' is already registered")]
    DuplicateRegistration(String),

    /// No tool registered under this name
    #[error("Tool '{0}' is not registered")]
    Unregistered(String),

    /// Dependency resolution found a cycle
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CircularDependency {
        /// Names along the cycle, first name repeated at the end
        path: Vec<String>,
    },

    /// Construction or initialization failed
    #[error("Failed to initialize tool '{name}': {source}")]
    Initialization {
        /// Tool that failed
        name: String,
        /// Underlying failure
        #[source]
        source: Box<InitializationCause>,
    },

    /// The registry has been disposed
    #[error("Registry has been disposed")]
    Disposed,
}

/// Why a tool could not be brought to the ready state
#[derive(Debug, Clone, Error)]
pub enum InitializationCause {
    /// Builder or `initialize()` returned an error
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A dependency could not be resolved
    #[error("dependency '{dependency}' failed: {error}")]
    Dependency {
        /// Dependency name
        dependency: String,
        /// Error raised while resolving it
        error: RegistryError,
    },
}

impl RegistryError {
    pub(crate) fn initialization(name: &str, cause: impl Into<InitializationCause>) -> Self {
        RegistryError::Initialization {
            name: name.to_string(),
            source: Box::new(cause.into()),
        }
    }

    /// Check whether this error (or a nested dependency error) is a cycle
    pub fn is_circular(&self) -> bool {
        match self {
            RegistryError::CircularDependency { .. } => true,
            RegistryError::Initialization { source, .. } => match source.as_ref() {
                InitializationCause::Dependency { error, .. } => error.is_circular(),
                InitializationCause::Tool(_) => false,
            },
            _ => false,
        }
    }
}
