//! # Conductor - Tool Orchestration Runtime
//!
//! Conductor wires independently written tools into one process:
//! - A **registry** that builds tools and their dependencies in order,
//!   caches singletons and disposes everything dependents-first
//! - An **event bus** with wildcard subscriptions, weak handlers and a
//!   bounded history
//! - A **configuration manager** merging files, environment variables and
//!   in-memory maps by priority
//! - An **executor** running every call through a middleware chain (logging,
//!   metrics, validation, caching, circuit breaking)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conductor_core::prelude::*;
//! use std::sync::Arc;
//!
//! struct Database;
//!
//! impl Tool for Database {
//!     fn name(&self) -> &str { "db" }
//! }
//!
//! struct Lookup {
//!     db: Arc<Database>,
//! }
//!
//! #[async_trait::async_trait]
//! impl Tool for Lookup {
//!     fn name(&self) -> &str { "lookup" }
//!
//!     async fn execute(&self, ctx: &ExecutionContext) -> std::result::Result<serde_json::Value, ToolError> {
//!         let _db = &self.db;
//!         Ok(serde_json::json!({ "found": ctx.input.get("id").is_some() }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let conductor = Conductor::builder().build()?;
//!     conductor.register(
//!         "db",
//!         |_ctx: BuildContext| async { Ok::<SharedTool, ToolError>(Arc::new(Database)) },
//!         RegistrationOptions::new(),
//!     )?;
//!     conductor.register(
//!         "lookup",
//!         |ctx: BuildContext| async move {
//!             let db = ctx.dependency::<Database>("db")?;
//!             Ok::<SharedTool, ToolError>(Arc::new(Lookup { db }))
//!         },
//!         RegistrationOptions::new().depends_on("db"),
//!     )?;
//!
//!     conductor.start().await?;
//!     let result = conductor
//!         .execute("lookup", ExecutionContext::new().with_input(serde_json::json!({ "id": 7 })))
//!         .await;
//!     println!("{:?}", result.result);
//!     conductor.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Runtime settings ([`config::ConductorConfig`]) load from `conductor.toml`
//! and `CONDUCTOR_` environment variables. Application settings go through a
//! [`config::ConfigManager`].

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod middleware;
pub mod registry;
pub mod runtime;
pub mod telemetry;
pub mod tools;

pub use error::{ConductorError, Result};

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        ConductorConfig, ConfigError, ConfigManager, ConfigMap, ConfigProvider, ConfigSource,
    };
    pub use crate::error::{ConductorError, Result};
    pub use crate::events::{
        Event, EventBus, EventBusConfig, EventError, EventHandler, EventPattern, SubscriptionId,
        handler_fn,
    };
    pub use crate::executor::{ExecutionContext, ExecutionError, ExecutionResult, ToolExecutor};
    pub use crate::middleware::{
        CacheConfig, CachingMiddleware, CircuitBreakerConfig, CircuitBreakerMiddleware,
        CircuitState, LoggingMiddleware, MetricsMiddleware, Middleware, MiddlewareError,
        SharedMiddleware, ValidationConfig, ValidationMiddleware,
    };
    pub use crate::registry::{
        BuildContext, Lifecycle, RegistrationOptions, RegistryError, ToolFactory, ToolMetadata,
        ToolRegistry,
    };
    pub use crate::runtime::{Conductor, ConductorBuilder};
    pub use crate::telemetry::init_tracing;
    pub use crate::tools::{SharedTool, Tool, ToolError, ToolErrorKind};
}
