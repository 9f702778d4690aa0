//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::context::ToolContext;
use super::error::ToolError;

/// A tool the LLM may invoke
///
/// Tools return opaque JSON maps; the toolkit flattens errors into the
/// `{error}` payload the model sees. A soft failure may also be reported by
/// embedding an `error` key in an otherwise successful result (the timeout
/// path of `run_command` does this to keep partial output).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as advertised to the LLM
    fn name(&self) -> &'static str;

    /// Human-readable description for the tool schema
    fn description(&self) -> &'static str;

    /// JSON Schema for the input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}
