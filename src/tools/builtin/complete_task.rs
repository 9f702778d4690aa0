//! complete_task tool - the agent's explicit completion signal

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::domain::DEFAULT_COMPLETION_PROMISE;
use crate::tools::{Tool, ToolContext, ToolError};

/// Signal that the task is complete
///
/// The loop watches for this call and appends the completion promise to the
/// iteration response; the tool itself just echoes the signal back.
pub struct CompleteTaskTool;

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &'static str {
        "complete_task"
    }

    fn description(&self) -> &'static str {
        "Signal that the task is complete. Only call this when ALL requirements are met and tests pass."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Summary of what was accomplished"
                }
            },
            "required": ["summary"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let summary = input["summary"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("summary is required".to_string()))?;

        info!(%summary, "task completion signaled");

        Ok(serde_json::json!({
            "signal": "COMPLETE",
            "summary": summary,
            "completion_promise": DEFAULT_COMPLETION_PROMISE,
        }))
    }
}
