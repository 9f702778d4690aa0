//! Iteration records and their constituent pieces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a single iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    Running,
    Completed,
    Failed,
    NeedsReview,
}

impl std::fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::NeedsReview => write!(f, "needs_review"),
        }
    }
}

/// Record of one tool invocation made by the agent during an iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,

    /// Opaque input map as the model emitted it
    pub arguments: Value,

    /// Opaque result map; `None` when the call errored before producing one
    pub result: Option<Value>,

    pub error: Option<String>,

    pub duration_ms: u64,

    pub timestamp: DateTime<Utc>,
}

/// Kind of action a file change records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Modify => write!(f, "modify"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Record of a file change made during an iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the working directory
    pub path: String,

    pub action: FileAction,

    /// First 200 chars of the written content
    pub content_preview: Option<String>,

    pub lines_added: u64,

    pub lines_removed: u64,
}

/// Backpressure check kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Test,
    Lint,
    Typecheck,
    Build,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Lint => write!(f, "lint"),
            Self::Typecheck => write!(f, "typecheck"),
            Self::Build => write!(f, "build"),
        }
    }
}

/// Result of one backpressure validation check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackpressureResult {
    pub check_type: CheckKind,

    pub passed: bool,

    /// Captured output, capped at 5000 chars
    pub output: String,

    /// Extracted error lines, capped at 20
    pub errors: Vec<String>,

    /// Extracted warning lines, capped at 10
    pub warnings: Vec<String>,

    pub duration_ms: u64,
}

/// Verdict of the completion detector for one iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    pub is_complete: bool,
    pub reason: String,
    pub confidence: f64,
    pub promise_detected: bool,
    pub all_tests_passed: bool,
    pub no_errors: bool,
}

impl Default for CompletionResult {
    fn default() -> Self {
        Self {
            is_complete: false,
            reason: String::new(),
            confidence: 0.0,
            promise_detected: false,
            all_tests_passed: false,
            no_errors: true,
        }
    }
}

/// A single iteration in the Ralph loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based position in the task's iteration list
    pub iteration_number: u32,

    pub status: IterationStatus,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,

    /// The literal prompt sent this iteration
    pub prompt_sent: String,

    /// Aggregated text the agent produced across the turn
    pub agent_response: String,

    /// Last text block containing "reasoning:", if any
    pub reasoning: String,

    pub tool_calls: Vec<ToolCallRecord>,
    pub file_changes: Vec<FileChange>,
    pub backpressure_results: Vec<BackpressureResult>,

    pub completion_promise_found: bool,
    pub completion_message: Option<String>,

    /// Input plus output tokens spent on this iteration's LLM turn
    pub tokens_used: u64,

    pub error: Option<String>,
}

impl Iteration {
    pub fn new(iteration_number: u32) -> Self {
        Self {
            iteration_number,
            status: IterationStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
            prompt_sent: String::new(),
            agent_response: String::new(),
            reasoning: String::new(),
            tool_calls: Vec::new(),
            file_changes: Vec::new(),
            backpressure_results: Vec::new(),
            completion_promise_found: false,
            completion_message: None,
            tokens_used: 0,
            error: None,
        }
    }

    /// Mark the iteration finished and stamp its duration
    pub fn finish(&mut self, status: IterationStatus) {
        let now = Utc::now();
        self.status = status;
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.completed_at = Some(now);
    }
}
