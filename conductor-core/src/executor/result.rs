//! Execution outcome types

use crate::tools::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Why an execution did not produce a value
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum ExecutionError {
    /// The tool itself returned an error
    #[error(transparent)]
    Tool(ToolError),

    /// A middleware refused to let the call proceed, or refused its result
    #[error("Execution rejected by middleware '{middleware}': {reason}")]
    Rejected {
        /// Middleware name
        middleware: String,
        /// Rejection reason
        reason: String,
    },

    /// The tool could not be resolved from the registry
    #[error("Tool resolution failed: {0}")]
    Resolution(String),
}

impl ExecutionError {
    /// Rejection raised by a middleware
    pub fn rejected(middleware: impl Into<String>, reason: impl Into<String>) -> Self {
        ExecutionError::Rejected {
            middleware: middleware.into(),
            reason: reason.into(),
        }
    }

    /// True if the tool body was never entered
    pub fn is_rejection(&self) -> bool {
        matches!(self, ExecutionError::Rejected { .. })
    }

    /// Tool error, if the failure originated in the tool
    pub fn as_tool_error(&self) -> Option<&ToolError> {
        match self {
            ExecutionError::Tool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ToolError> for ExecutionError {
    fn from(err: ToolError) -> Self {
        ExecutionError::Tool(err)
    }
}

/// Result of a tool execution with timing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult<T = Value> {
    /// Whether the execution succeeded
    pub success: bool,

    /// Value produced on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,

    /// Error captured on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,

    /// Wall-clock time spent in the pipeline
    #[serde(with = "humantime_serde")]
    pub execution_time: Duration,

    /// Additional result metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl<T> ExecutionResult<T> {
    /// Successful execution
    pub fn success(result: T, execution_time: Duration) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            execution_time,
            metadata: Map::new(),
        }
    }

    /// Failed execution
    pub fn failure(error: ExecutionError, execution_time: Duration) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            execution_time,
            metadata: Map::new(),
        }
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Execution time in fractional seconds
    pub fn execution_secs(&self) -> f64 {
        self.execution_time.as_secs_f64()
    }

    /// Convert into a standard `Result`
    pub fn into_result(self) -> Result<T, ExecutionError> {
        match (self.result, self.error) {
            (Some(value), None) if self.success => Ok(value),
            (_, Some(error)) => Err(error),
            _ => Err(ExecutionError::Resolution(
                "execution produced neither a result nor an error".to_string(),
            )),
        }
    }
}
