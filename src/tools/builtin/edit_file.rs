//! edit_file tool - targeted text replacement

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::domain::{FileAction, FileChange, preview};
use crate::tools::{Tool, ToolContext, ToolError};

/// Replace text in a file
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Edit a file by replacing specific text. Use for targeted changes."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to find and replace"
                },
                "new_text": {
                    "type": "string",
                    "description": "Text to replace with"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false, only first)"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = input["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("path is required".to_string()))?;
        let old_text = input["old_text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("old_text is required".to_string()))?;
        let new_text = input["new_text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("new_text is required".to_string()))?;
        let replace_all = input["replace_all"].as_bool().unwrap_or(false);

        let full_path = ctx.confine_path(Path::new(path))?;

        if !full_path.exists() {
            return Err(ToolError::NotFound(format!("File not found: {}", path)));
        }

        let content = tokio::fs::read_to_string(&full_path).await?;

        if !content.contains(old_text) {
            // Soft failure: keep the searched-for text in the payload so the
            // model can correct itself next round
            return Ok(serde_json::json!({
                "error": "Text not found in file",
                "searched_for": preview(old_text, 100),
            }));
        }

        let (new_content, count) = if replace_all {
            let count = content.matches(old_text).count();
            (content.replace(old_text, new_text), count)
        } else {
            (content.replacen(old_text, new_text, 1), 1)
        };

        tokio::fs::write(&full_path, &new_content).await?;

        ctx.record_change(FileChange {
            path: path.to_string(),
            action: FileAction::Modify,
            content_preview: Some(preview(new_text, 200)),
            lines_added: 0,
            lines_removed: 0,
        })
        .await;

        Ok(serde_json::json!({
            "success": true,
            "path": path,
            "replacements": count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_edit_file_first_occurrence() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("f.txt"), "hello world hello").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = EditFileTool
            .execute(
                serde_json::json!({"path": "f.txt", "old_text": "hello", "new_text": "goodbye"}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(result["replacements"], 1);
        assert_eq!(fs::read_to_string(temp.path().join("f.txt")).unwrap(), "goodbye world hello");
    }

    #[tokio::test]
    async fn test_edit_file_replace_all() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("f.txt"), "aaa bbb aaa").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = EditFileTool
            .execute(
                serde_json::json!({"path": "f.txt", "old_text": "aaa", "new_text": "ccc", "replace_all": true}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(result["replacements"], 2);
        assert_eq!(fs::read_to_string(temp.path().join("f.txt")).unwrap(), "ccc bbb ccc");
    }

    #[tokio::test]
    async fn test_edit_file_text_not_found() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("f.txt"), "content").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = EditFileTool
            .execute(
                serde_json::json!({"path": "f.txt", "old_text": "missing", "new_text": "x"}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(result["error"], "Text not found in file");
        // File untouched, no change recorded
        assert_eq!(fs::read_to_string(temp.path().join("f.txt")).unwrap(), "content");
        assert!(ctx.drain_changes().await.is_empty());
    }

    #[tokio::test]
    async fn test_edit_file_records_modify_change() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("f.txt"), "old").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        EditFileTool
            .execute(serde_json::json!({"path": "f.txt", "old_text": "old", "new_text": "new"}), &ctx)
            .await
            .unwrap();

        let changes = ctx.drain_changes().await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, FileAction::Modify);
    }

    #[tokio::test]
    async fn test_edit_round_trip_restores_file() {
        let temp = tempdir().unwrap();
        let original = "alpha beta gamma";
        fs::write(temp.path().join("f.txt"), original).unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        EditFileTool
            .execute(
                serde_json::json!({"path": "f.txt", "old_text": "beta", "new_text": "delta", "replace_all": true}),
                &ctx,
            )
            .await
            .unwrap();
        EditFileTool
            .execute(
                serde_json::json!({"path": "f.txt", "old_text": "delta", "new_text": "beta", "replace_all": true}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("f.txt")).unwrap(), original);
    }

    #[tokio::test]
    async fn test_edit_file_missing_file() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = EditFileTool
            .execute(serde_json::json!({"path": "nope.txt", "old_text": "a", "new_text": "b"}), &ctx)
            .await;

        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
