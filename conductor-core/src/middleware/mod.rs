//! Middleware hooks around tool execution
//!
//! A [`Middleware`] sees every execution twice: `pre_process` runs before the
//! tool in registration order and may rewrite the context, `post_process`
//! runs afterwards in reverse order and observes the outcome.
//!
//! Middleware cannot break an execution by failing. A
//! [`MiddlewareError::Failed`] is logged and the chain continues with the
//! context as it was before that middleware ran. Only an explicit
//! [`MiddlewareError::Rejected`] stops a call, which is how the circuit
//! breaker and strict validation refuse work.
//!
//! Built-in middleware:
//!
//! | Middleware | Purpose |
//! |------------|---------|
//! | [`LoggingMiddleware`] | start/finish log lines with timing |
//! | [`MetricsMiddleware`] | per-tool counts and durations |
//! | [`ValidationMiddleware`] | input and output checks, optionally strict |
//! | [`CachingMiddleware`] | TTL + LRU result cache keyed on tool input |
//! | [`CircuitBreakerMiddleware`] | stops calling a failing tool for a cooldown |

mod caching;
mod circuit_breaker;
mod logging;
mod metrics;
mod stopwatch;
mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use caching::{CACHE_HIT_KEY, CacheConfig, CacheStats, CachingMiddleware, cache_key};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerMiddleware, CircuitState};
pub use logging::LoggingMiddleware;
pub use metrics::{MetricsMiddleware, ToolMetrics};
pub use validation::{InputRule, OutputRule, ValidationConfig, ValidationMiddleware};

use crate::executor::{ExecutionContext, ExecutionError};
use crate::tools::Tool;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Outcome handed to [`Middleware::post_process`]
pub type Outcome = std::result::Result<Value, ExecutionError>;

/// Errors raised by middleware hooks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    /// The hook misbehaved; logged and otherwise ignored
    #[error("Middleware '{middleware}' failed: {message}")]
    Failed {
        /// Middleware name
        middleware: String,
        /// Failure message
        message: String,
    },

    /// The hook refuses to let the execution proceed or succeed
    #[error("Middleware '{middleware}' rejected the execution: {reason}")]
    Rejected {
        /// Middleware name
        middleware: String,
        /// Rejection reason
        reason: String,
    },
}

impl MiddlewareError {
    /// Non-fatal failure
    pub fn failed(middleware: impl Into<String>, message: impl Into<String>) -> Self {
        MiddlewareError::Failed {
            middleware: middleware.into(),
            message: message.into(),
        }
    }

    /// Rejection that stops the execution
    pub fn rejected(middleware: impl Into<String>, reason: impl Into<String>) -> Self {
        MiddlewareError::Rejected {
            middleware: middleware.into(),
            reason: reason.into(),
        }
    }

    /// Check whether this error stops the execution
    pub fn is_rejection(&self) -> bool {
        matches!(self, MiddlewareError::Rejected { .. })
    }
}

/// Cross-cutting hook pair run around every execution
///
/// Implementations must tolerate being skipped entirely (a disabled
/// middleware sees neither hook) and must not assume that changes made by
/// earlier middleware survived.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and for enabling/disabling
    fn name(&self) -> &str;

    /// Inspect or rewrite the context before the tool runs
    async fn pre_process(
        &self,
        _tool: &dyn Tool,
        context: ExecutionContext,
    ) -> Result<ExecutionContext, MiddlewareError> {
        Ok(context)
    }

    /// Observe the outcome after the tool ran (or was skipped)
    async fn post_process(
        &self,
        _tool: &dyn Tool,
        _context: &ExecutionContext,
        _outcome: &Outcome,
    ) -> Result<(), MiddlewareError> {
        Ok(())
    }
}

/// Shared middleware handle
pub type SharedMiddleware = Arc<dyn Middleware>;
