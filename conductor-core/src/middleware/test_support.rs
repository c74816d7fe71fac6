//! Tools shared by middleware tests

use crate::executor::ExecutionContext;
use crate::tools::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::Value;

/// Returns its input unchanged
pub(crate) struct EchoTool {
    name: String,
}

impl EchoTool {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<Value, ToolError> {
        Ok(context.input.clone())
    }
}
