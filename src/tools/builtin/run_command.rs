//! run_command tool - shell execution with denylist and timeout

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::domain::preview;
use crate::tools::shell::{denied_fragment, run_shell};
use crate::tools::{Tool, ToolContext, ToolError};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 300;
const STDOUT_CAP: usize = 10_000;
const STDERR_CAP: usize = 5_000;

/// Run a shell command in the working directory
pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn description(&self) -> &'static str {
        "Run a shell command. Use for running tests, linting, building, etc."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 60, max: 300)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let command = input["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("command is required".to_string()))?;

        // Refused before any subprocess is spawned
        if let Some(fragment) = denied_fragment(command) {
            return Err(ToolError::CommandDenied {
                fragment: fragment.to_string(),
            });
        }

        let timeout_secs = input["timeout"].as_u64().unwrap_or(DEFAULT_TIMEOUT_SECS).min(MAX_TIMEOUT_SECS);

        let out = run_shell(command, ctx.working_dir(), Duration::from_secs(timeout_secs)).await?;

        if out.timed_out {
            // Partial output survives the kill
            return Ok(serde_json::json!({
                "error": format!("Command timed out after {}s", timeout_secs),
                "stdout": preview(&out.stdout, STDOUT_CAP),
                "stderr": preview(&out.stderr, STDERR_CAP),
                "exit_code": -1,
                "success": false,
            }));
        }

        Ok(serde_json::json!({
            "stdout": preview(&out.stdout, STDOUT_CAP),
            "stderr": preview(&out.stderr, STDERR_CAP),
            "exit_code": out.exit_code,
            "success": out.exit_code == 0,
        }))
    }
}
