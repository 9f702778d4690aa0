//! write_file tool - create or overwrite a file

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::domain::{FileAction, FileChange, preview};
use crate::tools::{Tool, ToolContext, ToolError};

/// Write content to a file, creating parent directories as needed
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file (relative to working directory)"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = input["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("path is required".to_string()))?;
        let content = input["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("content is required".to_string()))?;

        let full_path = ctx.confine_path(Path::new(path))?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let existing = tokio::fs::read_to_string(&full_path).await.ok();
        let action = if existing.is_some() { FileAction::Modify } else { FileAction::Create };
        let old_lines = existing.map(|c| c.split('\n').count() as u64).unwrap_or(0);

        tokio::fs::write(&full_path, content).await?;
        let new_lines = content.split('\n').count() as u64;

        ctx.record_change(FileChange {
            path: path.to_string(),
            action,
            content_preview: Some(preview(content, 200)),
            lines_added: if action == FileAction::Create {
                new_lines
            } else {
                new_lines.saturating_sub(old_lines)
            },
            lines_removed: if action == FileAction::Create {
                0
            } else {
                old_lines.saturating_sub(new_lines)
            },
        })
        .await;

        Ok(serde_json::json!({
            "success": true,
            "path": path,
            "action": action.to_string(),
            "lines": new_lines,
        }))
    }
}
