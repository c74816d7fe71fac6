//! Tool abstractions shared by the registry and the executor
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use conductor_core::executor::ExecutionContext;
//! use conductor_core::tools::{Tool, ToolError};
//! use serde_json::Value;
//!
//! struct Slugify;
//!
//! #[async_trait]
//! impl Tool for Slugify {
//!     fn name(&self) -> &str {
//!         "slugify"
//!     }
//!
//!     async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, ToolError> {
//!         let title = ctx.input["title"]
//!             .as_str()
//!             .ok_or_else(|| ToolError::invalid_input("title is required"))?;
//!         Ok(Value::String(title.to_lowercase().replace(' ', "-")))
//!     }
//! }
//! ```

mod error;
mod tool;

pub use error::{ToolError, ToolErrorKind};
pub use tool::{AsAny, SharedTool, Tool, downcast_ref, downcast_tool};
