//! delete_file tool - unlink a file or remove an empty directory

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::domain::{FileAction, FileChange};
use crate::tools::{Tool, ToolContext, ToolError};

/// Delete a file or empty directory
pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn description(&self) -> &'static str {
        "Delete a file or empty directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to delete"
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

        let meta = tokio::fs::metadata(&full_path)
            .await
            .map_err(|_| ToolError::NotFound(format!("Path not found: {}", path)))?;

        if meta.is_file() {
            tokio::fs::remove_file(&full_path).await?;
            ctx.record_change(FileChange {
                path: path.to_string(),
                action: FileAction::Delete,
                content_preview: None,
                lines_added: 0,
                lines_removed: 0,
            })
            .await;
            Ok(serde_json::json!({"success": true, "path": path, "type": "file"}))
        } else {
            // Only removes empty directories
            tokio::fs::remove_dir(&full_path).await?;
            Ok(serde_json::json!({"success": true, "path": path, "type": "directory"}))
        }
    }
}
