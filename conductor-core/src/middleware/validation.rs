//! Input and output validation
//!
//! Built-in input checks require a non-empty request id and an object (or
//! absent) input. Built-in output checks require a non-null result and no
//! non-null `"error"` field in an object result. Extra rules can be added for
//! either side.
//!
//! In strict mode a violation rejects the execution; otherwise it is logged
//! as a warning and the execution continues.

use super::{Middleware, MiddlewareError, Outcome};
use crate::executor::ExecutionContext;
use crate::tools::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Extra check applied to the context before execution
pub type InputRule = Arc<dyn Fn(&ExecutionContext) -> Result<(), String> + Send + Sync>;

/// Extra check applied to a successful result
pub type OutputRule = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Validation switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Check contexts before execution
    #[serde(default = "enabled")]
    pub validate_input: bool,
    /// Check results after execution
    #[serde(default = "enabled")]
    pub validate_output: bool,
    /// Reject instead of warn
    #[serde(default)]
    pub strict: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_input: true,
            validate_output: true,
            strict: false,
        }
    }
}

impl ValidationConfig {
    /// Reject on violations
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Validates contexts and results
pub struct ValidationMiddleware {
    config: ValidationConfig,
    input_rules: Vec<(String, InputRule)>,
    output_rules: Vec<(String, OutputRule)>,
}

impl Default for ValidationMiddleware {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl ValidationMiddleware {
    /// Create a validator
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            input_rules: Vec::new(),
            output_rules: Vec::new(),
        }
    }

    /// Add a named input rule
    pub fn with_input_rule<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.input_rules.push((name.into(), Arc::new(rule)));
        self
    }

    /// Add a named output rule
    pub fn with_output_rule<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.output_rules.push((name.into(), Arc::new(rule)));
        self
    }

    /// Current configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Input violations for a context
    pub fn check_input(&self, context: &ExecutionContext) -> Vec<String> {
        let mut violations = Vec::new();

        if context.request_id().trim().is_empty() {
            violations.push("request id is empty".to_string());
        }
        if !matches!(context.input, Value::Object(_) | Value::Null) {
            violations.push(format!(
                "input must be an object, got {}",
                json_type(&context.input)
            ));
        }
        for (name, rule) in &self.input_rules {
            if let Err(message) = rule(context) {
                violations.push(format!("{name}: {message}"));
            }
        }
        violations
    }

    /// Output violations for a result value
    pub fn check_output(&self, value: &Value) -> Vec<String> {
        let mut violations = Vec::new();

        if value.is_null() {
            violations.push("result is null".to_string());
        }
        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            violations.push(format!("result contains an error: {error}"));
        }
        for (name, rule) in &self.output_rules {
            if let Err(message) = rule(value) {
                violations.push(format!("{name}: {message}"));
            }
        }
        violations
    }

    fn verdict(&self, tool: &dyn Tool, stage: &str, violations: Vec<String>) -> Result<(), MiddlewareError> {
        if violations.is_empty() {
            return Ok(());
        }
        let reason = format!("{} validation failed: {}", stage, violations.join("; "));
        if self.config.strict {
            tracing::error!(tool = %tool.name(), stage, reason = %reason, "Validation rejected execution");
            Err(MiddlewareError::rejected(self.name(), reason))
        } else {
            tracing::warn!(tool = %tool.name(), stage, reason = %reason, "Validation warning");
            Ok(())
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    fn name(&self) -> &str {
        "validation"
    }

    async fn pre_process(
        &self,
        tool: &dyn Tool,
        context: ExecutionContext,
    ) -> Result<ExecutionContext, MiddlewareError> {
        if self.config.validate_input {
            self.verdict(tool, "input", self.check_input(&context))?;
        }
        Ok(context)
    }

    async fn post_process(
        &self,
        tool: &dyn Tool,
        _context: &ExecutionContext,
        outcome: &Outcome,
    ) -> Result<(), MiddlewareError> {
        match outcome {
            Ok(value) if self.config.validate_output => {
                self.verdict(tool, "output", self.check_output(value))
            }
            _ => Ok(()),
        }
    }
}
