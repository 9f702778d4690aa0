//! Toolkit - the fixed tool catalog and its dispatcher

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::builtin::{
    CompleteTaskTool, CreateDirectoryTool, DeleteFileTool, EditFileTool, GitCommitTool, GitDiffTool, GitStatusTool,
    ListFilesTool, ReadFileTool, RunCommandTool, SearchFilesTool, WriteFileTool,
};
use super::{Tool, ToolContext};
use crate::domain::ToolCallRecord;
use crate::llm::ToolDefinition;

/// Executes the fixed catalog of tools for one task
pub struct Toolkit {
    tools: HashMap<&'static str, Box<dyn Tool>>,
}

impl Toolkit {
    /// Create the standard catalog
    pub fn standard() -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ReadFileTool),
            Box::new(WriteFileTool),
            Box::new(EditFileTool),
            Box::new(ListFilesTool),
            Box::new(SearchFilesTool),
            Box::new(RunCommandTool),
            Box::new(GitStatusTool),
            Box::new(GitDiffTool),
            Box::new(GitCommitTool),
            Box::new(CreateDirectoryTool),
            Box::new(DeleteFileTool),
            Box::new(CompleteTaskTool),
        ];

        Self {
            tools: tools.into_iter().map(|t| (t.name(), t)).collect(),
        }
    }

    /// Tool schemas for the LLM request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.input_schema()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute one tool call and return its fully-populated record.
    ///
    /// Never fails: unknown tools and tool failures become the record's
    /// `error` field. A result carrying an embedded `error` key (soft
    /// failure with partial data) sets `error` too.
    pub async fn execute(&self, name: &str, arguments: Value, ctx: &ToolContext) -> ToolCallRecord {
        let start = Instant::now();
        debug!(tool = %name, "executing tool");

        let outcome = match self.tools.get(name) {
            Some(tool) => tool.execute(arguments.clone(), ctx).await,
            None => Err(super::ToolError::InvalidArgument(format!("Unknown tool: {}", name))),
        };

        let (result, error) = match outcome {
            Ok(value) => {
                let embedded = value.get("error").and_then(|e| e.as_str()).map(String::from);
                (Some(value), embedded)
            }
            Err(e) => (None, Some(e.to_string())),
        };

        if let Some(ref e) = error {
            debug!(tool = %name, error = %e, "tool call errored");
        }

        ToolCallRecord {
            tool_name: name.to_string(),
            arguments,
            result,
            error,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        }
    }
}

impl Default for Toolkit {
    fn default() -> Self {
        Self::standard()
    }
}
