//! read_file tool - read file contents, optionally a line range

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolError};

/// Read a file's contents
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file. Use this to understand existing code before making changes."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file (relative to working directory)"
                },
                "start_line": {
                    "type": "integer",
                    "description": "Starting line number (1-indexed, optional)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Ending line number (inclusive, optional)"
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
            .map_err(|_| ToolError::NotFound(format!("File not found: {}", path)))?;
        if !meta.is_file() {
            return Err(ToolError::NotFound(format!("Not a file: {}", path)));
        }

        let full_content = tokio::fs::read_to_string(&full_path).await?;

        let start_line = input["start_line"].as_u64().map(|n| n as usize);
        let end_line = input["end_line"].as_u64().map(|n| n as usize);

        let content = if start_line.is_some() || end_line.is_some() {
            let lines: Vec<&str> = full_content.split('\n').collect();
            let start = start_line.unwrap_or(1).saturating_sub(1).min(lines.len());
            let end = end_line.unwrap_or(lines.len()).min(lines.len());
            lines[start..end.max(start)].join("\n")
        } else {
            full_content
        };

        Ok(serde_json::json!({
            "path": path,
            "content": content,
            "lines": content.split('\n').count(),
            "size": content.len(),
        }))
    }
}
