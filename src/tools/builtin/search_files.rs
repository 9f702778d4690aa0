//! search_files tool - pattern search across the working directory
//!
//! Prefers external grep for speed; falls back to an in-process regex walk
//! when grep finds nothing or is unavailable.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

use crate::domain::preview;
use crate::tools::shell::run_shell;
use crate::tools::{Tool, ToolContext, ToolError};

/// Cap on matches returned in one search
const MAX_MATCHES: usize = 50;

const GREP_TIMEOUT: Duration = Duration::from_secs(30);

/// Search for a text pattern in files
pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &'static str {
        "search_files"
    }

    fn description(&self) -> &'static str {
        "Search for text pattern in files. Returns matching lines with context."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text or regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: current)"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Filter files by glob pattern (e.g., '*.rs')"
                },
                "context_lines": {
                    "type": "integer",
                    "description": "Number of context lines to show (default: 2)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let pattern = input["pattern"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("pattern is required".to_string()))?;
        let path = input["path"].as_str().unwrap_or(".");
        let file_pattern = input["file_pattern"].as_str();
        let context_lines = input["context_lines"].as_u64().unwrap_or(2);

        let dir = ctx.confine_path(Path::new(path))?;

        // Fast path: external grep. Patterns with embedded single quotes
        // break the constructed command and land in the fallback walk below.
        let mut grep_cmd = String::from("grep -rn");
        if context_lines > 0 {
            grep_cmd.push_str(&format!(" -C {}", context_lines));
        }
        if let Some(fp) = file_pattern {
            grep_cmd.push_str(&format!(" --include='{}'", fp));
        }
        grep_cmd.push_str(&format!(" '{}' {}", pattern, dir.display()));

        if let Ok(out) = run_shell(&grep_cmd, ctx.working_dir(), GREP_TIMEOUT).await
            && !out.stdout.is_empty()
        {
            let matches: Vec<&str> = out.stdout.lines().take(MAX_MATCHES).collect();
            return Ok(serde_json::json!({
                "pattern": pattern,
                "matches": matches,
                "total": matches.len(),
            }));
        }

        // Fallback: in-process regex walk
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ToolError::InvalidArgument(format!("Invalid pattern: {}", e)))?;

        let file_glob = match file_pattern {
            Some(fp) => Some(
                glob::Pattern::new(fp).map_err(|e| ToolError::InvalidArgument(format!("Invalid file pattern: {}", e)))?,
            ),
            None => None,
        };

        let mut matches = Vec::new();
        'outer: for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ref g) = file_glob {
                let name = entry.file_name().to_string_lossy();
                if !g.matches(&name) {
                    continue;
                }
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            for (i, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    let rel = entry
                        .path()
                        .strip_prefix(ctx.working_dir())
                        .unwrap_or(entry.path())
                        .to_string_lossy()
                        .into_owned();
                    matches.push(serde_json::json!({
                        "file": rel,
                        "line": i + 1,
                        "content": preview(line.trim(), 200),
                    }));
                    if matches.len() >= MAX_MATCHES {
                        break 'outer;
                    }
                }
            }
        }

        Ok(serde_json::json!({
            "pattern": pattern,
            "total": matches.len(),
            "matches": matches,
        }))
    }
}
