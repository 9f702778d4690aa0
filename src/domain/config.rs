//! Per-task configuration

use serde::{Deserialize, Serialize};

/// The literal the agent is instructed to emit when the task is done
pub const DEFAULT_COMPLETION_PROMISE: &str = "<promise>COMPLETE</promise>";

/// Configuration for a single Ralph task
///
/// Every field has a default so callers can override only what they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Literal string that marks completion when it appears in a response
    pub completion_promise: String,

    /// Hard ceiling on outer loop iterations
    pub max_iterations: u32,

    /// Per-command timeout hint in seconds
    pub iteration_timeout_seconds: u64,

    /// Run the test backpressure check after each iteration
    pub run_tests: bool,

    /// Run the lint backpressure check after each iteration
    pub run_lint: bool,

    /// Run the typecheck backpressure check after each iteration
    pub run_typecheck: bool,

    /// Run the build backpressure check after each iteration
    pub run_build: bool,

    /// Explicit test command; auto-detected from the working directory if unset
    pub test_command: Option<String>,

    /// Explicit lint command
    pub lint_command: Option<String>,

    /// Explicit typecheck command
    pub typecheck_command: Option<String>,

    /// Explicit build command
    pub build_command: Option<String>,

    /// Include git history and status in the iteration context
    pub include_git_history: bool,

    /// Include modified-file contents in the iteration context
    pub include_file_contents: bool,

    /// Cap on files included in the iteration context
    pub max_context_files: usize,

    /// Root for all filesystem and shell operations
    pub working_directory: String,

    /// LLM model identifier (opaque to the loop)
    pub model: String,

    /// Max tokens per LLM response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            completion_promise: DEFAULT_COMPLETION_PROMISE.to_string(),
            max_iterations: 50,
            iteration_timeout_seconds: 300,
            run_tests: true,
            run_lint: true,
            run_typecheck: true,
            run_build: false,
            test_command: None,
            lint_command: None,
            typecheck_command: None,
            build_command: None,
            include_git_history: true,
            include_file_contents: true,
            max_context_files: 20,
            working_directory: ".".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 16000,
            temperature: 0.7,
        }
    }
}

impl TaskConfig {
    /// Whether any backpressure check is enabled
    pub fn backpressure_enabled(&self) -> bool {
        self.run_tests || self.run_lint || self.run_typecheck || self.run_build
    }
}
