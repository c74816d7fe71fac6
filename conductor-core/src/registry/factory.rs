//! Typed tool builders
//!
//! A factory receives the resolved dependencies of the tool it builds in a
//! [`BuildContext`] instead of having them matched to constructor parameters
//! at runtime.

use crate::tools::{SharedTool, Tool, ToolError, downcast_tool};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Resolved dependencies handed to a factory, in declaration order
#[derive(Clone, Default)]
pub struct Dependencies {
    entries: Vec<(String, SharedTool)>,
}

impl Dependencies {
    pub(crate) fn push(&mut self, name: String, tool: SharedTool) {
        self.entries.push((name, tool));
    }

    /// Shared handle of a dependency
    pub fn get_shared(&self, name: &str) -> Option<SharedTool> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, tool)| tool.clone())
    }

    /// Dependency downcast to its concrete type
    pub fn get<T: Tool>(&self, name: &str) -> Option<Arc<T>> {
        self.get_shared(name).and_then(downcast_tool::<T>)
    }

    /// Dependency names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of dependencies
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check for no dependencies
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Everything a factory needs to build one instance
#[derive(Debug, Clone)]
pub struct BuildContext {
    name: String,
    config: Option<Value>,
    dependencies: Dependencies,
}

impl BuildContext {
    pub(crate) fn new(name: &str, config: Option<Value>, dependencies: Dependencies) -> Self {
        Self {
            name: name.to_string(),
            config,
            dependencies,
        }
    }

    /// Name the tool is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration passed to the resolving `get` call
    pub fn config(&self) -> Option<&Value> {
        self.config.as_ref()
    }

    /// Deserialize the configuration into a typed struct
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<Option<T>, ToolError> {
        self.config
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ToolError::invalid_input(format!("Invalid config for '{}': {}", self.name, e)))
    }

    /// Resolved dependencies
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Typed dependency, failing if it is missing or has another type
    pub fn dependency<T: Tool>(&self, name: &str) -> Result<Arc<T>, ToolError> {
        let shared = self.dependencies.get_shared(name).ok_or_else(|| {
            ToolError::initialization(format!(
                "'{}' does not declare a dependency on '{}'",
                self.name, name
            ))
        })?;
        downcast_tool::<T>(shared).ok_or_else(|| {
            ToolError::initialization(format!(
                "Dependency '{}' of '{}' is not a {}",
                name,
                self.name,
                std::any::type_name::<T>()
            ))
        })
    }
}

/// Builder registered for each tool
#[async_trait]
pub trait ToolFactory: Send + Sync {
    /// Construct a new, uninitialized instance
    async fn build(&self, context: BuildContext) -> Result<SharedTool, ToolError>;
}

#[async_trait]
impl<F, Fut> ToolFactory for F
where
    F: Fn(BuildContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<SharedTool, ToolError>> + Send,
{
    async fn build(&self, context: BuildContext) -> Result<SharedTool, ToolError> {
        (self)(context).await
    }
}

/// Shared factory handle
pub type SharedFactory = Arc<dyn ToolFactory>;
