//! Git tools - status, diff, and commit via the git CLI
//!
//! All three shell out; a missing git binary or a non-repo directory simply
//! yields a failing result the model can read.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::tools::shell::{ShellOutput, run_shell};
use crate::tools::{Tool, ToolContext, ToolError};

const GIT_TIMEOUT: Duration = Duration::from_secs(60);

fn to_result(out: ShellOutput) -> Value {
    serde_json::json!({
        "stdout": out.stdout,
        "stderr": out.stderr,
        "exit_code": out.exit_code,
        "success": out.success(),
    })
}

/// Show working tree status
pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &'static str {
        "git_status"
    }

    fn description(&self) -> &'static str {
        "Get git status showing modified, staged, and untracked files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let out = run_shell("git status --porcelain && git status -sb", ctx.working_dir(), GIT_TIMEOUT).await?;
        Ok(to_result(out))
    }
}

/// Show changes in files
pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &'static str {
        "git_diff"
    }

    fn description(&self) -> &'static str {
        "Get git diff showing changes in files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Specific file to diff (optional)"
                },
                "staged": {
                    "type": "boolean",
                    "description": "Show staged changes (default: false)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let mut cmd = String::from("git diff");
        if input["staged"].as_bool().unwrap_or(false) {
            cmd.push_str(" --staged");
        }
        if let Some(path) = input["path"].as_str() {
            cmd.push_str(&format!(" -- {}", path));
        }

        let out = run_shell(&cmd, ctx.working_dir(), GIT_TIMEOUT).await?;
        Ok(to_result(out))
    }
}

/// Create a commit
pub struct GitCommitTool;

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &'static str {
        "git_commit"
    }

    fn description(&self) -> &'static str {
        "Create a git commit with staged changes."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message"
                },
                "add_all": {
                    "type": "boolean",
                    "description": "Stage all changes before committing (default: false)"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let message = input["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("message is required".to_string()))?;

        if input["add_all"].as_bool().unwrap_or(false) {
            let add = run_shell("git add -A", ctx.working_dir(), GIT_TIMEOUT).await?;
            if !add.success() {
                return Ok(serde_json::json!({
                    "error": format!("Git add failed: {}", add.stderr),
                }));
            }
        }

        // Single-quote escaping for the shell
        let safe_message = message.replace('\'', "'\\''");
        let out = run_shell(&format!("git commit -m '{}'", safe_message), ctx.working_dir(), GIT_TIMEOUT).await?;
        Ok(to_result(out))
    }
}
