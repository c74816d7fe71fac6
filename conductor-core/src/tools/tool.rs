//! Tool trait definitions
//!
//! A tool is any unit of work the runtime can construct, initialize, invoke,
//! and dispose. Tools that only exist to be injected into other tools (a
//! database handle, an HTTP client) implement the lifecycle hooks and leave
//! [`Tool::execute`] at its default.

use super::error::ToolError;
use crate::executor::ExecutionContext;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Type-erasure helpers that let registry consumers recover concrete tool types
pub trait AsAny: Any + Send + Sync {
    /// Borrow as `Any` for by-reference downcasts
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared handle into `Arc<dyn Any>` for owned downcasts
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Core trait for components managed by the runtime
///
/// `initialize` is called at most once per instance by the registry before the
/// instance is handed out. `dispose` may be called on an instance that never
/// finished initializing and must tolerate repeated calls.
#[async_trait]
pub trait Tool: AsAny {
    /// Tool name (unique identifier)
    fn name(&self) -> &str;

    /// Prepare resources before first use
    async fn initialize(&self) -> Result<(), ToolError> {
        Ok(())
    }

    /// Release resources
    async fn dispose(&self) -> Result<(), ToolError> {
        Ok(())
    }

    /// Run the tool's operation against the invocation context
    async fn execute(&self, _context: &ExecutionContext) -> Result<Value, ToolError> {
        Err(ToolError::not_invokable(self.name()))
    }
}

/// Type alias for a shared tool handle
pub type SharedTool = Arc<dyn Tool>;

/// Recover the concrete type behind a shared tool handle
pub fn downcast_tool<T: Tool>(tool: SharedTool) -> Option<Arc<T>> {
    AsAny::into_any(tool).downcast::<T>().ok()
}

/// Borrow the concrete type behind a tool reference
pub fn downcast_ref<T: Tool>(tool: &dyn Tool) -> Option<&T> {
    tool.as_any().downcast_ref::<T>()
}
