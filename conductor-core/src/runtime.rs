//! Runtime facade wiring the bus, registry and executor together

use crate::config::{ConductorConfig, ConfigError, ConfigManager};
use crate::error::Result;
use crate::events::EventBus;
use crate::executor::{ExecutionContext, ExecutionResult, ToolExecutor};
use crate::middleware::{
    CachingMiddleware, CircuitBreakerMiddleware, LoggingMiddleware, MetricsMiddleware,
    SharedMiddleware, ValidationMiddleware,
};
use crate::registry::{RegistrationOptions, ToolFactory, ToolRegistry};
use std::sync::Arc;

/// One event bus, one registry and one executor sharing a configuration
///
/// ```rust,no_run
/// use conductor_core::prelude::*;
/// use std::sync::Arc;
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl Tool for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     async fn execute(&self, ctx: &ExecutionContext) -> std::result::Result<serde_json::Value, ToolError> {
///         Ok(ctx.input.clone())
///     }
/// }
///
/// # async fn demo() -> conductor_core::Result<()> {
/// let conductor = Conductor::builder().build()?;
/// conductor.register(
///     "echo",
///     |_ctx: BuildContext| async { Ok::<SharedTool, ToolError>(Arc::new(Echo)) },
///     RegistrationOptions::new(),
/// )?;
/// conductor.start().await?;
///
/// let result = conductor
///     .execute("echo", ExecutionContext::new().with_input(serde_json::json!({"q": 1})))
///     .await;
/// assert!(result.success);
///
/// conductor.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Conductor {
    config: ConductorConfig,
    event_bus: Arc<EventBus>,
    registry: Arc<ToolRegistry>,
    executor: Arc<ToolExecutor>,
    config_manager: Option<Arc<ConfigManager>>,
    metrics: Option<Arc<MetricsMiddleware>>,
    cache: Option<Arc<CachingMiddleware>>,
    circuit_breaker: Option<Arc<CircuitBreakerMiddleware>>,
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("has_config_manager", &self.config_manager.is_some())
            .finish()
    }
}

impl Conductor {
    /// Start building a runtime
    pub fn builder() -> ConductorBuilder {
        ConductorBuilder::new()
    }

    /// Runtime settings in effect
    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Shared event bus
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Shared registry
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Shared executor
    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    /// Attached configuration manager, if any
    pub fn config_manager(&self) -> Option<&Arc<ConfigManager>> {
        self.config_manager.as_ref()
    }

    /// Installed metrics middleware
    pub fn metrics(&self) -> Option<&Arc<MetricsMiddleware>> {
        self.metrics.as_ref()
    }

    /// Installed caching middleware
    pub fn cache(&self) -> Option<&Arc<CachingMiddleware>> {
        self.cache.as_ref()
    }

    /// Installed circuit breaker
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreakerMiddleware>> {
        self.circuit_breaker.as_ref()
    }

    /// Register a tool with the registry
    pub fn register<F>(
        &self,
        name: impl Into<String>,
        factory: F,
        options: RegistrationOptions,
    ) -> Result<()>
    where
        F: ToolFactory + 'static,
    {
        self.registry.register(name, factory, options)?;
        Ok(())
    }

    /// Start the executor and bus, then build eager tools
    ///
    /// Fails if a registration names an unknown dependency or a cycle, or if
    /// an eager tool cannot be built.
    pub async fn start(&self) -> Result<()> {
        let problems = self.registry.validate_dependencies();
        if !problems.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "registry has unresolved dependencies: {}",
                problems.join("; ")
            ))
            .into());
        }

        self.executor.start().await;
        let built = self.registry.warm_up().await?;
        tracing::info!(eager_tools = built, "Conductor started");
        Ok(())
    }

    /// Resolve and execute a tool by name
    pub async fn execute(&self, name: &str, context: ExecutionContext) -> ExecutionResult {
        self.executor.execute(name, context).await
    }

    /// Stop the executor, dispose every tool, then stop the bus
    pub async fn shutdown(&self) {
        self.executor.stop().await;
        self.registry.dispose_all().await;
        self.event_bus.stop().await;
        tracing::info!("Conductor shut down");
    }
}

/// Builder for [`Conductor`]
///
/// The standard middleware stack runs in this order: logging, metrics,
/// validation, caching, circuit breaker, then any custom middleware. Each
/// standard middleware can be switched off.
pub struct ConductorBuilder {
    config: ConductorConfig,
    config_manager: Option<Arc<ConfigManager>>,
    logging: bool,
    metrics: bool,
    validation: bool,
    caching: bool,
    circuit_breaker: bool,
    custom: Vec<SharedMiddleware>,
}

impl Default for ConductorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConductorBuilder {
    /// Builder with default settings and the full middleware stack
    pub fn new() -> Self {
        Self {
            config: ConductorConfig::default(),
            config_manager: None,
            logging: true,
            metrics: true,
            validation: true,
            caching: true,
            circuit_breaker: true,
            custom: Vec::new(),
        }
    }

    /// Use these runtime settings
    pub fn config(mut self, config: ConductorConfig) -> Self {
        self.config = config;
        self
    }

    /// Read runtime settings from the `key` subtree of a loaded manager and
    /// attach the manager
    pub fn config_from(mut self, manager: Arc<ConfigManager>, key: &str) -> Result<Self> {
        self.config = manager.extract(key)?;
        self.config_manager = Some(manager);
        Ok(self)
    }

    /// Attach a configuration manager without reading settings from it
    pub fn config_manager(mut self, manager: Arc<ConfigManager>) -> Self {
        self.config_manager = Some(manager);
        self
    }

    /// Toggle the logging middleware
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Toggle the metrics middleware
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Toggle the validation middleware
    pub fn validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    /// Toggle the caching middleware
    pub fn caching(mut self, enabled: bool) -> Self {
        self.caching = enabled;
        self
    }

    /// Toggle the circuit breaker
    pub fn circuit_breaker(mut self, enabled: bool) -> Self {
        self.circuit_breaker = enabled;
        self
    }

    /// Append a middleware after the standard stack
    pub fn middleware(mut self, middleware: SharedMiddleware) -> Self {
        self.custom.push(middleware);
        self
    }

    /// Validate the settings and wire the runtime
    pub fn build(self) -> Result<Conductor> {
        let config = self.config;
        config.validate()?;

        let event_bus = Arc::new(EventBus::with_config(config.event_bus.clone()));
        let registry = Arc::new(ToolRegistry::new());
        let executor = ToolExecutor::new(event_bus.clone()).with_registry(registry.clone());

        if self.logging {
            let level = config.logging.tracing_level()?;
            executor.add_middleware(Arc::new(
                LoggingMiddleware::new(level).with_context(config.logging.include_context),
            ));
        }

        let metrics = self
            .metrics
            .then(|| Arc::new(MetricsMiddleware::new().with_event_bus(event_bus.clone())));
        if let Some(metrics) = &metrics {
            executor.add_middleware(metrics.clone());
        }

        if self.validation {
            executor.add_middleware(Arc::new(ValidationMiddleware::new(
                config.validation.clone(),
            )));
        }

        let cache = self
            .caching
            .then(|| Arc::new(CachingMiddleware::new(config.cache.clone())));
        if let Some(cache) = &cache {
            executor.add_middleware(cache.clone());
        }

        let circuit_breaker = self.circuit_breaker.then(|| {
            Arc::new(CircuitBreakerMiddleware::new(
                config.circuit_breaker.clone(),
            ))
        });
        if let Some(breaker) = &circuit_breaker {
            executor.add_middleware(breaker.clone());
        }

        for middleware in self.custom {
            executor.add_middleware(middleware);
        }

        tracing::debug!(middleware = ?executor.middleware_names(), "Conductor built");

        Ok(Conductor {
            config,
            event_bus,
            registry,
            executor: Arc::new(executor),
            config_manager: self.config_manager,
            metrics,
            cache,
            circuit_breaker,
        })
    }
}
