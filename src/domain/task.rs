//! RalphTask - the unit of work the supervisor drives
//!
//! Status transitions only move forward: pending -> running -> one of the
//! terminal states. Once terminal, the task is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::iteration::{CompletionResult, Iteration};
use super::{TaskConfig, preview};

/// Status of a Ralph task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A task to be executed by the Ralph loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RalphTask {
    pub id: Uuid,

    /// The task description fed to the agent every iteration
    pub prompt: String,

    /// Optional human-readable description
    pub description: String,

    pub config: TaskConfig,

    pub status: TaskStatus,

    /// Equals `iterations.len()` after every `add_iteration`
    pub current_iteration: u32,

    pub iterations: Vec<Iteration>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub completion_result: Option<CompletionResult>,
    pub final_output: Option<String>,
    pub error: Option<String>,

    pub total_tool_calls: u64,
    pub total_file_changes: u64,
    pub total_tokens_used: u64,
}

impl RalphTask {
    pub fn new(prompt: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            description: description.into(),
            config: TaskConfig::default(),
            status: TaskStatus::Pending,
            current_iteration: 0,
            iterations: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            completion_result: None,
            final_output: None,
            error: None,
            total_tool_calls: 0,
            total_file_changes: 0,
            total_tokens_used: 0,
        }
    }

    /// Builder method to attach a config
    pub fn with_config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Cancelled
        )
    }

    /// Transition pending -> running
    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Terminal transition: the completion detector accepted the task
    pub fn complete(&mut self, result: CompletionResult, final_output: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.completion_result = Some(result);
        self.final_output = Some(final_output.into());
    }

    /// Terminal transition: a stop condition tripped
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Terminal transition: max iterations reached
    pub fn timeout(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Timeout;
        self.completed_at = Some(Utc::now());
        self.error = Some(format!("Task timed out after {} iterations", self.current_iteration));
    }

    /// Terminal transition: caller-requested cancellation
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Append a finished iteration and roll up its aggregates
    pub fn add_iteration(&mut self, iteration: Iteration) {
        self.total_tool_calls += iteration.tool_calls.len() as u64;
        self.total_file_changes += iteration.file_changes.len() as u64;
        self.iterations.push(iteration);
        self.current_iteration = self.iterations.len() as u32;
    }

    /// Wall-clock duration from start until completion (or now, if running)
    pub fn duration_seconds(&self) -> f64 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - started).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Compact snapshot for status queries and listings
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            status: self.status,
            prompt_preview: preview(&self.prompt, 100),
            iterations_completed: self.current_iteration,
            max_iterations: self.config.max_iterations,
            duration_seconds: self.duration_seconds(),
            total_tool_calls: self.total_tool_calls,
            total_file_changes: self.total_file_changes,
            is_complete: self.completion_result.as_ref().is_some_and(|r| r.is_complete),
            error: self.error.clone(),
            created_at: self.created_at,
        }
    }
}

/// Snapshot of a task for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub status: TaskStatus,
    pub prompt_preview: String,
    pub iterations_completed: u32,
    pub max_iterations: u32,
    pub duration_seconds: f64,
    pub total_tool_calls: u64,
    pub total_file_changes: u64,
    pub is_complete: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
