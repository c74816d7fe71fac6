//! Per-invocation execution context

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Context for a single tool invocation
///
/// Owned by exactly one in-flight execution. Middleware may rewrite the
/// input and metadata, but the request id is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Unique id of this invocation
    request_id: String,

    /// Session the invocation belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Actor (user or agent) on whose behalf the tool runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,

    /// Invocation arguments passed to the tool
    #[serde(default)]
    pub input: Value,

    /// Free-form metadata shared along the middleware chain
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Response supplied by middleware in place of invoking the tool
    #[serde(skip)]
    short_circuit: Option<Value>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Create a context with a fresh request id
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    /// Create a context with a caller-chosen request id
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            session_id: None,
            actor_id: None,
            input: Value::Null,
            metadata: Map::new(),
            short_circuit: None,
        }
    }

    /// Set session ID
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set actor ID
    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Set invocation input
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Unique id of this invocation
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Answer the invocation without running the tool
    pub fn respond_with(&mut self, value: Value) {
        self.short_circuit = Some(value);
    }

    /// Response supplied by middleware, if any
    pub fn short_circuit(&self) -> Option<&Value> {
        self.short_circuit.as_ref()
    }

    pub(crate) fn take_short_circuit(&mut self) -> Option<Value> {
        self.short_circuit.take()
    }

    pub(crate) fn restore_request_id(&mut self, request_id: &str) {
        self.request_id = request_id.to_string();
    }
}
