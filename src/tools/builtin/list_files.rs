//! list_files tool - directory listing with optional glob filtering

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::tools::{Tool, ToolContext, ToolError};

/// Cap on entries returned in one listing
const MAX_ENTRIES: usize = 100;

/// List files in a directory
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List files in a directory with optional pattern matching."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path (default: current directory)"
                },
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to filter files (e.g., '*.rs', '**/*.ts')"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Search recursively (default: false)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = input["path"].as_str().unwrap_or(".");
        let pattern = input["pattern"].as_str();
        let recursive = input["recursive"].as_bool().unwrap_or(false);

        let dir = ctx.confine_path(Path::new(path))?;
        if !dir.is_dir() {
            return Err(ToolError::NotFound(format!("Directory not found: {}", path)));
        }

        let found = collect_entries(&dir, pattern, recursive)?;
        let truncated = found.len() > MAX_ENTRIES;

        let mut files: Vec<Value> = found
            .into_iter()
            .take(MAX_ENTRIES)
            .filter_map(|entry| {
                let rel = entry.strip_prefix(ctx.working_dir()).ok()?;
                let meta = std::fs::metadata(&entry).ok();
                let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
                let size = meta.filter(|m| m.is_file()).map(|m| m.len()).unwrap_or(0);
                Some(serde_json::json!({
                    "path": rel.to_string_lossy(),
                    "is_dir": is_dir,
                    "size": size,
                }))
            })
            .collect();

        files.sort_by(|a, b| a["path"].as_str().unwrap_or("").cmp(b["path"].as_str().unwrap_or("")));

        Ok(serde_json::json!({
            "path": path,
            "total": files.len(),
            "files": files,
            "truncated": truncated,
        }))
    }
}

fn collect_entries(dir: &Path, pattern: Option<&str>, recursive: bool) -> Result<Vec<PathBuf>, ToolError> {
    match pattern {
        Some(p) => {
            let glob_pattern = if recursive {
                dir.join("**").join(p)
            } else {
                dir.join(p)
            };
            let paths = glob::glob(&glob_pattern.to_string_lossy())
                .map_err(|e| ToolError::InvalidArgument(format!("Invalid pattern: {}", e)))?;
            Ok(paths.filter_map(Result::ok).collect())
        }
        None if recursive => Ok(WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()),
        None => {
            let entries = std::fs::read_dir(dir)?;
            Ok(entries.filter_map(Result::ok).map(|e| e.path()).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> tempfile::TempDir {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(temp.path().join("b.txt"), "text").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/c.rs"), "fn c() {}").unwrap();
        temp
    }

    #[tokio::test]
    async fn test_list_files_flat() {
        let temp = setup();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ListFilesTool.execute(serde_json::json!({}), &ctx).await.unwrap();

        assert_eq!(result["total"], 3);
        assert_eq!(result["truncated"], false);
        let paths: Vec<&str> = result["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"a.rs"));
        assert!(paths.contains(&"sub"));
    }

    #[tokio::test]
    async fn test_list_files_pattern() {
        let temp = setup();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ListFilesTool
            .execute(serde_json::json!({"pattern": "*.rs"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result["total"], 1);
        assert_eq!(result["files"][0]["path"], "a.rs");
    }

    #[tokio::test]
    async fn test_list_files_recursive_pattern() {
        let temp = setup();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ListFilesTool
            .execute(serde_json::json!({"pattern": "*.rs", "recursive": true}), &ctx)
            .await
            .unwrap();

        let paths: Vec<&str> = result["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"a.rs"));
        assert!(paths.contains(&"sub/c.rs"));
    }

    #[tokio::test]
    async fn test_list_files_sorted() {
        let temp = setup();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ListFilesTool.execute(serde_json::json!({}), &ctx).await.unwrap();

        let paths: Vec<&str> = result["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap())
            .collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[tokio::test]
    async fn test_list_files_caps_entries() {
        let temp = tempdir().unwrap();
        for i in 0..120 {
            fs::write(temp.path().join(format!("f{:03}.txt", i)), "x").unwrap();
        }
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ListFilesTool.execute(serde_json::json!({}), &ctx).await.unwrap();

        assert_eq!(result["total"], 100);
        assert_eq!(result["truncated"], true);
    }

    #[tokio::test]
    async fn test_list_files_missing_directory() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ListFilesTool.execute(serde_json::json!({"path": "absent"}), &ctx).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
