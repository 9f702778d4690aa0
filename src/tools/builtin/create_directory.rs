//! create_directory tool

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolError};

/// Create a directory, including parents
pub struct CreateDirectoryTool;

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &'static str {
        "create_directory"
    }

    fn description(&self) -> &'static str {
        "Create a directory (including parent directories)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path to create"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = input["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("path is required".to_string()))?;

        let full_path = ctx.confine_path(Path::new(path))?;
        tokio::fs::create_dir_all(&full_path).await?;

        Ok(serde_json::json!({"success": true, "path": path}))
    }
}
