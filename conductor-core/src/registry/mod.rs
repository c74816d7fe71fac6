//! Component registry with dependency resolution and lifecycle management
//!
//! The [`ToolRegistry`] maps names to factories. Each registration declares the
//! names it depends on; resolving a tool resolves those first (depth-first,
//! memoized per call), passes them to the factory, calls `initialize()`, and
//! caches singleton instances until [`ToolRegistry::dispose_all`].
//!
//! # Example
//!
//! ```rust,no_run
//! use conductor_core::registry::{BuildContext, RegistrationOptions, ToolRegistry};
//! use conductor_core::tools::{SharedTool, Tool, ToolError};
//! use std::sync::Arc;
//!
//! struct Database;
//! impl Tool for Database {
//!     fn name(&self) -> &str { "db" }
//! }
//!
//! struct Api { db: Arc<Database> }
//! impl Tool for Api {
//!     fn name(&self) -> &str { "api" }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ToolRegistry::new();
//! registry.register(
//!     "db",
//!     |_ctx: BuildContext| async { Ok::<SharedTool, ToolError>(Arc::new(Database)) },
//!     RegistrationOptions::new(),
//! )?;
//! registry.register(
//!     "api",
//!     |ctx: BuildContext| async move {
//!         let db = ctx.dependency::<Database>("db")?;
//!         Ok::<SharedTool, ToolError>(Arc::new(Api { db }))
//!     },
//!     RegistrationOptions::new().depends_on("db"),
//! )?;
//!
//! assert!(registry.validate_dependencies().is_empty());
//! let api = registry.get("api").await?;
//! registry.dispose_all().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod factory;
mod graph;
mod metadata;
#[allow(clippy::module_inception)]
mod registry;

#[cfg(test)]
mod tests;

pub use error::{InitializationCause, RegistryError};
pub use factory::{BuildContext, Dependencies, SharedFactory, ToolFactory};
pub use graph::{CycleDetected, DependencyGraph};
pub use metadata::{Lifecycle, RegistrationOptions, ToolMetadata};
pub use registry::{RegistryStats, ToolRegistry};
