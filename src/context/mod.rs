//! Context assembly for each iteration
//!
//! Gathers task info, recent iteration history, git state, modified-file
//! contents, and the last backpressure feedback into one structure, then
//! flattens it into the report embedded in the iteration prompt. Failures
//! while gathering degrade to omitted sections - context building never
//! fails an iteration.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::domain::{IterationStatus, RalphTask, preview};
use crate::tools::shell::run_shell;

/// Iterations summarized for the model
const HISTORY_LIMIT: usize = 10;

/// Iterations rendered verbatim in the flattened form
const HISTORY_VERBATIM: usize = 3;

/// Cap on file content carried in the structured context
const FILE_CONTENT_CAP: usize = 5000;

/// Tighter cap applied when flattening file content into the prompt
const FILE_PROMPT_CAP: usize = 2000;

const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Structured context for one iteration
#[derive(Debug, Clone, Serialize)]
pub struct TaskContext {
    pub task_info: TaskInfo,
    pub iteration_history: Vec<IterationSummary>,
    pub git: Option<GitContext>,
    pub modified_files: Vec<ModifiedFile>,
    pub backpressure: Option<BackpressureFeedback>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub original_prompt: String,
    pub description: String,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub iterations_remaining: u32,
    pub completion_promise: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationSummary {
    pub iteration: u32,
    pub status: IterationStatus,
    pub duration_ms: u64,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCallSummary>,
    pub file_changes: Vec<FileChangeSummary>,
    pub backpressure: Vec<CheckSummary>,
    pub completion_promise_found: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallSummary {
    pub tool: String,
    pub result_preview: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileChangeSummary {
    pub path: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub check_type: String,
    pub passed: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitContext {
    pub current_branch: String,
    pub recent_commits: Vec<String>,
    pub uncommitted_changes: Vec<StatusEntry>,
    pub diff_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub status: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifiedFile {
    pub path: String,
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackpressureFeedback {
    pub all_passed: bool,
    pub results: Vec<CheckFeedback>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckFeedback {
    pub check_type: String,
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub output_preview: String,
}

/// Builds the per-iteration context for a task
pub struct ContextBuilder {
    working_dir: PathBuf,
}

impl ContextBuilder {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }

    /// Assemble the full context from task history and filesystem state
    pub async fn build(&self, task: &RalphTask) -> TaskContext {
        let git = if task.config.include_git_history {
            self.build_git_context().await
        } else {
            None
        };

        let modified_files = if task.config.include_file_contents {
            self.build_file_context(task).await
        } else {
            Vec::new()
        };

        TaskContext {
            task_info: build_task_info(task),
            iteration_history: build_iteration_history(task),
            git,
            modified_files,
            backpressure: build_backpressure_feedback(task),
        }
    }

    async fn build_git_context(&self) -> Option<GitContext> {
        let probe = self.run_git("git rev-parse --git-dir").await?;
        if probe.to_lowercase().contains("fatal") {
            return None;
        }

        let current_branch = self
            .run_git("git branch --show-current")
            .await
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let recent_commits = self
            .run_git("git log --oneline -20 --format='%h %s'")
            .await
            .map(|out| out.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
            .unwrap_or_default();

        let uncommitted_changes = self
            .run_git("git status --porcelain")
            .await
            .map(|out| {
                out.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|line| StatusEntry {
                        status: line.chars().take(2).collect(),
                        path: line.chars().skip(3).collect::<String>().trim().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let diff_summary = self
            .run_git("git diff --stat HEAD")
            .await
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Some(GitContext {
            current_branch,
            recent_commits,
            uncommitted_changes,
            diff_summary,
        })
    }

    /// Run a git command, returning stdout on success and `None` otherwise
    async fn run_git(&self, command: &str) -> Option<String> {
        match run_shell(command, &self.working_dir, GIT_TIMEOUT).await {
            Ok(out) if out.success() => Some(out.stdout),
            Ok(_) => None,
            Err(e) => {
                warn!(%command, error = %e, "git command failed while building context");
                None
            }
        }
    }

    /// Read the files this task has touched, newest-first dedup preserved
    async fn build_file_context(&self, task: &RalphTask) -> Vec<ModifiedFile> {
        let mut paths: Vec<String> = Vec::new();
        for iteration in &task.iterations {
            for change in &iteration.file_changes {
                if !paths.contains(&change.path) {
                    paths.push(change.path.clone());
                }
            }
        }

        let mut files = Vec::new();
        for path in paths.into_iter().take(task.config.max_context_files) {
            match tokio::fs::read_to_string(self.working_dir.join(&path)).await {
                Ok(content) => {
                    let truncated = content.len() > FILE_CONTENT_CAP;
                    files.push(ModifiedFile {
                        path,
                        content: preview(&content, FILE_CONTENT_CAP),
                        truncated,
                    });
                }
                Err(e) => {
                    warn!(%path, error = %e, "skipping unreadable file in context");
                }
            }
        }
        files
    }
}

fn build_task_info(task: &RalphTask) -> TaskInfo {
    TaskInfo {
        original_prompt: task.prompt.clone(),
        description: task.description.clone(),
        current_iteration: task.current_iteration,
        max_iterations: task.config.max_iterations,
        iterations_remaining: task.config.max_iterations.saturating_sub(task.current_iteration),
        completion_promise: task.config.completion_promise.clone(),
    }
}

fn build_iteration_history(task: &RalphTask) -> Vec<IterationSummary> {
    task.iterations
        .iter()
        .rev()
        .take(HISTORY_LIMIT)
        .rev()
        .map(|iteration| IterationSummary {
            iteration: iteration.iteration_number,
            status: iteration.status,
            duration_ms: iteration.duration_ms,
            reasoning: iteration.reasoning.clone(),
            tool_calls: iteration
                .tool_calls
                .iter()
                .map(|tc| ToolCallSummary {
                    tool: tc.tool_name.clone(),
                    result_preview: tc.result.as_ref().map(|r| preview(&r.to_string(), 200)),
                    error: tc.error.clone(),
                })
                .collect(),
            file_changes: iteration
                .file_changes
                .iter()
                .map(|fc| FileChangeSummary {
                    path: fc.path.clone(),
                    action: fc.action.to_string(),
                })
                .collect(),
            backpressure: iteration
                .backpressure_results
                .iter()
                .map(|bp| CheckSummary {
                    check_type: bp.check_type.to_string(),
                    passed: bp.passed,
                    errors: bp.errors.iter().take(3).cloned().collect(),
                })
                .collect(),
            completion_promise_found: iteration.completion_promise_found,
            error: iteration.error.clone(),
        })
        .collect()
}

fn build_backpressure_feedback(task: &RalphTask) -> Option<BackpressureFeedback> {
    let last = task.iterations.last()?;
    if last.backpressure_results.is_empty() {
        return None;
    }

    Some(BackpressureFeedback {
        all_passed: last.backpressure_results.iter().all(|bp| bp.passed),
        results: last
            .backpressure_results
            .iter()
            .map(|bp| CheckFeedback {
                check_type: bp.check_type.to_string(),
                passed: bp.passed,
                errors: bp.errors.clone(),
                warnings: bp.warnings.clone(),
                output_preview: preview(&bp.output, 500),
            })
            .collect(),
    })
}

impl TaskContext {
    /// Flatten into the labeled report embedded in the iteration prompt.
    ///
    /// Section order is stable: TASK CONTEXT, PREVIOUS ITERATIONS, GIT
    /// STATUS, LAST VALIDATION RESULTS, FILES MODIFIED IN THIS TASK.
    pub fn format_for_prompt(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        parts.push("=".repeat(60));
        parts.push("TASK CONTEXT".to_string());
        parts.push("=".repeat(60));
        parts.push(format!(
            "Iteration: {} of {}",
            self.task_info.current_iteration, self.task_info.max_iterations
        ));
        parts.push(format!("Iterations remaining: {}", self.task_info.iterations_remaining));
        parts.push(format!(
            "Completion signal: Include '{}' when task is fully complete",
            self.task_info.completion_promise
        ));
        parts.push(String::new());

        if !self.iteration_history.is_empty() {
            parts.push("-".repeat(40));
            parts.push("PREVIOUS ITERATIONS:".to_string());
            parts.push("-".repeat(40));
            let skip = self.iteration_history.len().saturating_sub(HISTORY_VERBATIM);
            for h in self.iteration_history.iter().skip(skip) {
                parts.push(format!("\nIteration {}:", h.iteration));
                parts.push(format!("  Status: {}", h.status));
                if !h.reasoning.is_empty() {
                    parts.push(format!("  Reasoning: {}", preview(&h.reasoning, 200)));
                }
                if let Some(ref error) = h.error {
                    parts.push(format!("  Error: {}", error));
                }
                if !h.file_changes.is_empty() {
                    let paths: Vec<&str> = h.file_changes.iter().map(|fc| fc.path.as_str()).collect();
                    parts.push(format!("  Files changed: {:?}", paths));
                }
                for check in &h.backpressure {
                    let status = if check.passed { "PASSED" } else { "FAILED" };
                    parts.push(format!("  {}: {}", check.check_type, status));
                    for error in check.errors.iter().take(2) {
                        parts.push(format!("    - {}", error));
                    }
                }
            }
            parts.push(String::new());
        }

        if let Some(ref git) = self.git {
            parts.push("-".repeat(40));
            parts.push("GIT STATUS:".to_string());
            parts.push("-".repeat(40));
            parts.push(format!("Branch: {}", git.current_branch));
            if !git.uncommitted_changes.is_empty() {
                parts.push("Uncommitted changes:".to_string());
                for change in git.uncommitted_changes.iter().take(10) {
                    parts.push(format!("  [{}] {}", change.status, change.path));
                }
            }
            if let Some(ref diff) = git.diff_summary {
                parts.push("\nDiff summary:".to_string());
                parts.push(preview(diff, 500));
            }
            parts.push(String::new());
        }

        if let Some(ref feedback) = self.backpressure {
            parts.push("-".repeat(40));
            parts.push("LAST VALIDATION RESULTS:".to_string());
            parts.push("-".repeat(40));
            parts.push(format!(
                "Overall: {}",
                if feedback.all_passed { "ALL PASSED" } else { "SOME FAILED" }
            ));
            for result in &feedback.results {
                let status = if result.passed { "PASSED" } else { "FAILED" };
                parts.push(format!("\n{}: {}", result.check_type.to_uppercase(), status));
                if !result.errors.is_empty() {
                    parts.push("Errors:".to_string());
                    for error in result.errors.iter().take(5) {
                        parts.push(format!("  - {}", error));
                    }
                }
                if !result.passed && !result.output_preview.is_empty() {
                    parts.push(format!("Output:\n{}", preview(&result.output_preview, 300)));
                }
            }
            parts.push(String::new());
        }

        if !self.modified_files.is_empty() {
            parts.push("-".repeat(40));
            parts.push("FILES MODIFIED IN THIS TASK:".to_string());
            parts.push("-".repeat(40));
            for file in self.modified_files.iter().take(5) {
                parts.push(format!("\n--- {} ---", file.path));
                if file.truncated {
                    parts.push("(truncated, showing first 5000 chars)".to_string());
                }
                parts.push(preview(&file.content, FILE_PROMPT_CAP));
            }
            parts.push(String::new());
        }

        parts.join("\n")
    }
}
