//! Logging middleware

use super::stopwatch::Stopwatch;
use super::{Middleware, MiddlewareError, Outcome};
use crate::executor::ExecutionContext;
use crate::tools::Tool;
use async_trait::async_trait;
use tracing::Level;

/// Emit a tracing event at a level chosen at runtime
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        if $level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if $level == Level::WARN {
            tracing::warn!($($arg)+)
        } else if $level == Level::INFO {
            tracing::info!($($arg)+)
        } else if $level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

/// Logs the start and end of every execution
pub struct LoggingMiddleware {
    level: Level,
    include_context: bool,
    stopwatch: Stopwatch,
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingMiddleware {
    /// Log at the given level
    pub fn new(level: Level) -> Self {
        Self {
            level,
            include_context: false,
            stopwatch: Stopwatch::new("logging_started_ns"),
        }
    }

    /// Include input and metadata in the start line
    pub fn with_context(mut self, include_context: bool) -> Self {
        self.include_context = include_context;
        self
    }

    /// Configured level
    pub fn level(&self) -> Level {
        self.level
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn pre_process(
        &self,
        tool: &dyn Tool,
        mut context: ExecutionContext,
    ) -> Result<ExecutionContext, MiddlewareError> {
        self.stopwatch.start(&mut context);

        if self.include_context {
            log_at!(
                self.level,
                tool = %tool.name(),
                request_id = %context.request_id(),
                input = %context.input,
                metadata = ?context.metadata,
                "Executing tool"
            );
        } else {
            log_at!(
                self.level,
                tool = %tool.name(),
                request_id = %context.request_id(),
                "Executing tool"
            );
        }
        Ok(context)
    }

    async fn post_process(
        &self,
        tool: &dyn Tool,
        context: &ExecutionContext,
        outcome: &Outcome,
    ) -> Result<(), MiddlewareError> {
        let elapsed_ms = self
            .stopwatch
            .elapsed(context)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0);

        match outcome {
            Ok(_) => log_at!(
                self.level,
                tool = %tool.name(),
                request_id = %context.request_id(),
                elapsed_ms = ?elapsed_ms,
                "Tool execution completed"
            ),
            Err(e) => tracing::warn!(
                tool = %tool.name(),
                request_id = %context.request_id(),
                elapsed_ms = ?elapsed_ms,
                error = %e,
                "Tool execution failed"
            ),
        }
        Ok(())
    }
}
