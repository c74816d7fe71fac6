//! Structured tool error model
//!
//! Tool failures carry a kind (which decides retryability), a message, and
//! optional machine-readable context. Errors are cloneable and serializable so
//! they can travel inside [`ExecutionResult`](crate::executor::ExecutionResult)
//! values and event payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured tool error with taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error kind (determines retryability)
    pub kind: ToolErrorKind,

    /// Human-readable error message
    pub message: String,

    /// Underlying error code (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ToolError {
    /// Create a new tool error
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            context: None,
        }
    }

    /// Add an error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add context
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// The tool only participates as a dependency and has no `execute` body
    pub fn not_invokable(tool_name: &str) -> Self {
        Self::new(
            ToolErrorKind::NotInvokable,
            format!("Tool '{}' does not support direct execution", tool_name),
        )
        .with_code("NOT_INVOKABLE")
    }

    /// Input rejected by the tool
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidInput, message).with_code("INVALID_INPUT")
    }

    /// Generic execution failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Failed, message)
    }

    /// Failure of a downstream service that may succeed on retry
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Transient, message)
    }

    /// Failure raised from `Tool::initialize`
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Initialization, message).with_code("INIT_FAILED")
    }

    /// Failure raised from `Tool::dispose`
    pub fn disposal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Disposal, message).with_code("DISPOSE_FAILED")
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message).with_code("INTERNAL_ERROR")
    }

    /// Check if retrying the call could succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        ToolError::failed(format!("{:#}", err))
    }
}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Input validation failed (not retryable - fix input)
    InvalidInput,

    /// Tool has no executable body
    NotInvokable,

    /// Tool failed to initialize
    Initialization,

    /// Tool failed to release its resources
    Disposal,

    /// Execution failed
    Failed,

    /// Transient network/service error (retryable)
    Transient,

    /// Internal tool error (not retryable - bug)
    Internal,
}

impl ToolErrorKind {
    /// Check if this error kind is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolErrorKind::Transient)
    }
}
