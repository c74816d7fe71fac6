//! Tool execution pipeline
//!
//! [`ToolExecutor::execute_tool`] wraps one tool call:
//!
//! 1. emit `tool.execution.started`
//! 2. run each enabled middleware's `pre_process` in registration order
//! 3. invoke the tool (unless a middleware rejected or short-circuited)
//! 4. run `post_process` in reverse order for the middleware reached in step 2
//! 5. emit `tool.execution.completed` or `tool.execution.failed` and return an
//!    [`ExecutionResult`]
//!
//! # Example
//!
//! ```rust,no_run
//! use conductor_core::events::EventBus;
//! use conductor_core::executor::{ExecutionContext, ToolExecutor};
//! use conductor_core::middleware::{LoggingMiddleware, MetricsMiddleware};
//! use conductor_core::registry::ToolRegistry;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let bus = Arc::new(EventBus::new());
//! let registry = Arc::new(ToolRegistry::new());
//! let executor = ToolExecutor::new(bus)
//!     .with_registry(registry)
//!     .with_middleware(LoggingMiddleware::default())
//!     .with_middleware(MetricsMiddleware::new());
//!
//! let result = executor
//!     .execute("search", ExecutionContext::new().with_input(json!({"q": "rust"})))
//!     .await;
//! println!("success={} in {:?}", result.success, result.execution_time);
//! # }
//! ```

mod context;
#[allow(clippy::module_inception)]
mod executor;
mod result;


pub use context::ExecutionContext;
pub use executor::{
    EXECUTION_COMPLETED, EXECUTION_FAILED, EXECUTION_STARTED, EXECUTOR_STARTED, EXECUTOR_STOPPED,
    ToolExecutor,
};
pub use result::{ExecutionError, ExecutionResult};
