//! Tool executor implementation

use super::context::ExecutionContext;
use super::result::{ExecutionError, ExecutionResult};
use crate::events::{Event, EventBus};
use crate::middleware::{Middleware, MiddlewareError, Outcome, SharedMiddleware};
use crate::registry::ToolRegistry;
use crate::tools::{Tool, ToolError};
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;

/// Event emitted before the middleware chain runs
pub const EXECUTION_STARTED: &str = "tool.execution.started";
/// Event emitted after a successful execution
pub const EXECUTION_COMPLETED: &str = "tool.execution.completed";
/// Event emitted after a failed or rejected execution
pub const EXECUTION_FAILED: &str = "tool.execution.failed";
/// Event emitted by [`ToolExecutor::start`]
pub const EXECUTOR_STARTED: &str = "executor.started";
/// Event emitted by [`ToolExecutor::stop`]
pub const EXECUTOR_STOPPED: &str = "executor.stopped";

struct MiddlewareSlot {
    middleware: SharedMiddleware,
    enabled: AtomicBool,
}

/// Runs tools through the middleware chain and reports on the event bus
pub struct ToolExecutor {
    event_bus: Arc<EventBus>,
    registry: Option<Arc<ToolRegistry>>,
    middleware: RwLock<Vec<Arc<MiddlewareSlot>>>,
    running: AtomicBool,
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("middleware", &self.middleware_names())
            .field("has_registry", &self.registry.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ToolExecutor {
    /// Create an executor publishing to the given bus
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            event_bus,
            registry: None,
            middleware: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Resolve tools by name from a registry
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Append a middleware to the chain
    pub fn add_middleware(&self, middleware: SharedMiddleware) {
        tracing::debug!(middleware = %middleware.name(), "Added middleware");
        self.middleware.write().push(Arc::new(MiddlewareSlot {
            middleware,
            enabled: AtomicBool::new(true),
        }));
    }

    /// Builder form of [`add_middleware`](Self::add_middleware)
    pub fn with_middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.add_middleware(Arc::new(middleware));
        self
    }

    /// Remove every middleware with this name
    pub fn remove_middleware(&self, name: &str) -> bool {
        let mut chain = self.middleware.write();
        let before = chain.len();
        chain.retain(|slot| slot.middleware.name() != name);
        before != chain.len()
    }

    /// Enable or disable middleware by name
    ///
    /// Returns whether any middleware matched.
    pub fn set_middleware_enabled(&self, name: &str, enabled: bool) -> bool {
        let chain = self.middleware.read();
        let mut found = false;
        for slot in chain.iter().filter(|s| s.middleware.name() == name) {
            slot.enabled.store(enabled, Ordering::SeqCst);
            found = true;
        }
        if found {
            tracing::info!(middleware = %name, enabled, "Middleware toggled");
        }
        found
    }

    /// Names of the middleware in chain order
    pub fn middleware_names(&self) -> Vec<String> {
        self.middleware
            .read()
            .iter()
            .map(|slot| slot.middleware.name().to_string())
            .collect()
    }

    /// Bus this executor publishes to
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Registry used by [`execute`](Self::execute), if any
    pub fn registry(&self) -> Option<&Arc<ToolRegistry>> {
        self.registry.as_ref()
    }

    /// Mark the executor running and announce it
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.event_bus.start().await;
        self.publish(
            EXECUTOR_STARTED,
            None,
            json!({ "middleware": self.middleware_names() }),
        )
        .await;
        tracing::info!("Executor started");
    }

    /// Mark the executor stopped and announce it
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.publish(EXECUTOR_STOPPED, None, json!({})).await;
        tracing::info!("Executor stopped");
    }

    /// Check whether the executor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolve a tool from the registry and execute it
    pub async fn execute(&self, name: &str, context: ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let resolved = match &self.registry {
            Some(registry) => registry
                .get(name)
                .await
                .map_err(|e| ExecutionError::Resolution(e.to_string())),
            None => Err(ExecutionError::Resolution(format!(
                "no registry attached, cannot resolve '{}'",
                name
            ))),
        };

        match resolved {
            Ok(tool) => self.execute_tool(tool.as_ref(), context).await,
            Err(error) => {
                tracing::error!(tool = %name, error = %error, "Tool resolution failed");
                let result = ExecutionResult::failure(error, started.elapsed());
                self.publish_outcome(name, context.request_id(), &result)
                    .await;
                result
            }
        }
    }

    /// Execute a tool through the middleware chain
    ///
    /// Never returns an error directly; tool failures, middleware rejections
    /// and their timing are captured in the returned result.
    pub async fn execute_tool(
        &self,
        tool: &dyn Tool,
        context: ExecutionContext,
    ) -> ExecutionResult {
        let started = Instant::now();
        let tool_name = tool.name().to_string();
        let request_id = context.request_id().to_string();

        self.publish(
            EXECUTION_STARTED,
            Some(&request_id),
            json!({
                "tool_name": tool_name,
                "request_id": request_id,
            }),
        )
        .await;

        let chain: Vec<SharedMiddleware> = self
            .middleware
            .read()
            .iter()
            .filter(|slot| slot.enabled.load(Ordering::SeqCst))
            .map(|slot| slot.middleware.clone())
            .collect();

        let mut context = context;
        let mut entered: Vec<SharedMiddleware> = Vec::with_capacity(chain.len());
        let mut rejection: Option<ExecutionError> = None;

        for middleware in chain {
            let snapshot = context.clone();
            let pre = AssertUnwindSafe(middleware.pre_process(tool, context))
                .catch_unwind()
                .await;
            let pre = match pre {
                Ok(pre) => pre,
                Err(panic) => {
                    tracing::error!(tool = %tool_name, middleware = %middleware.name(), panic = %panic_message(&*panic), "Middleware pre-processing panicked");
                    context = snapshot;
                    entered.push(middleware);
                    continue;
                }
            };
            match pre {
                Ok(mut next) => {
                    if next.request_id() != request_id {
                        tracing::warn!(
                            middleware = %middleware.name(),
                            request_id = %request_id,
                            "Middleware replaced the request id, restoring it"
                        );
                        next.restore_request_id(&request_id);
                    }
                    context = next;
                    entered.push(middleware);
                }
                Err(MiddlewareError::Rejected {
                    middleware: name,
                    reason,
                }) => {
                    tracing::info!(tool = %tool_name, middleware = %name, reason = %reason, "Execution rejected");
                    context = snapshot;
                    rejection = Some(ExecutionError::Rejected {
                        middleware: name,
                        reason,
                    });
                    break;
                }
                Err(e) => {
                    tracing::warn!(tool = %tool_name, middleware = %middleware.name(), error = %e, "Middleware pre-processing failed");
                    context = snapshot;
                    entered.push(middleware);
                }
            }

            if context.short_circuit().is_some() {
                tracing::debug!(tool = %tool_name, "Execution short-circuited by middleware");
                break;
            }
        }

        let mut outcome: Outcome = match rejection {
            Some(error) => Err(error),
            None => match context.take_short_circuit() {
                Some(value) => Ok(value),
                None => match AssertUnwindSafe(tool.execute(&context)).catch_unwind().await {
                    Ok(outcome) => outcome.map_err(ExecutionError::from),
                    Err(panic) => {
                        let message = panic_message(&*panic);
                        tracing::error!(tool = %tool_name, panic = %message, "Tool panicked");
                        Err(ToolError::internal(format!("tool panicked: {}", message)).into())
                    }
                },
            },
        };

        for middleware in entered.iter().rev() {
            let post = AssertUnwindSafe(middleware.post_process(tool, &context, &outcome))
                .catch_unwind()
                .await;
            let post = match post {
                Ok(post) => post,
                Err(panic) => {
                    tracing::error!(tool = %tool_name, middleware = %middleware.name(), panic = %panic_message(&*panic), "Middleware post-processing panicked");
                    continue;
                }
            };
            match post {
                Ok(()) => {}
                Err(MiddlewareError::Rejected {
                    middleware: name,
                    reason,
                }) if outcome.is_ok() => {
                    tracing::warn!(tool = %tool_name, middleware = %name, reason = %reason, "Result rejected");
                    outcome = Err(ExecutionError::Rejected {
                        middleware: name,
                        reason,
                    });
                }
                Err(e) => {
                    tracing::warn!(tool = %tool_name, middleware = %middleware.name(), error = %e, "Middleware post-processing failed");
                }
            }
        }

        let elapsed = started.elapsed();
        let mut result = match outcome {
            Ok(value) => ExecutionResult::success(value, elapsed),
            Err(error) => ExecutionResult::failure(error, elapsed),
        };
        result.metadata = context.metadata;

        self.publish_outcome(&tool_name, &request_id, &result).await;
        result
    }

    async fn publish_outcome(&self, tool_name: &str, request_id: &str, result: &ExecutionResult) {
        let mut data = json!({
            "tool_name": tool_name,
            "request_id": request_id,
            "execution_time": result.execution_secs(),
            "success": result.success,
        });

        let name = if result.success {
            data["result"] = result.result.clone().unwrap_or(Value::Null);
            EXECUTION_COMPLETED
        } else {
            let error = result.error.as_ref();
            data["error"] = json!(error.map(|e| e.to_string()));
            data["error_detail"] = error
                .and_then(|e| serde_json::to_value(e).ok())
                .unwrap_or(Value::Null);
            EXECUTION_FAILED
        };

        self.publish(name, Some(request_id), data).await;
    }

    async fn publish(&self, name: &str, correlation_id: Option<&str>, data: Value) {
        let event = match Event::with_payload(name, data) {
            Ok(event) => event.with_source("executor"),
            Err(e) => {
                tracing::error!(event = %name, error = %e, "Failed to build event");
                return;
            }
        };
        let event = match correlation_id {
            Some(id) => event.with_correlation_id(id),
            None => event,
        };
        self.event_bus.emit(event).await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
