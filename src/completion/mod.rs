//! Completion detection
//!
//! Decides two separate questions after every iteration: is the task
//! semantically complete, and must the outer loop stop regardless. The
//! strongest signal is the explicit completion promise; below that sits a
//! heuristic built from backpressure state and phrase matching.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

use crate::domain::{CompletionResult, DEFAULT_COMPLETION_PROMISE, Iteration, RalphTask};

/// Alternate completion markers accepted besides the configured promise
static ALT_PROMISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"<promise>COMPLETE</promise>",
        r"TASK[_\s]?COMPLETE",
        r"LOOP[_\s]?COMPLETE",
        r"DONE[_\s]?COMPLETE",
        r"\[COMPLETE\]",
        r"\[DONE\]",
    ]
    .iter()
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("alternate promise pattern must compile")
    })
    .collect()
});

/// Patterns that suggest the response is reporting a failure
static CRITICAL_ERROR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"error:?\s*(.{10,100})",
        r"failed:?\s*(.{10,100})",
        r"exception:?\s*(.{10,100})",
        r"cannot\s+(.{10,50})",
        r"unable\s+to\s+(.{10,50})",
    ]
    .iter()
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("critical error pattern must compile")
    })
    .collect()
});

/// Substrings that disqualify an apparent error match
const ERROR_EXCLUSIONS: &[&str] = &["no error", "without error", "error handling"];

const COMPLETION_PHRASES: &[&str] = &[
    "task is complete",
    "completed successfully",
    "all done",
    "finished implementing",
    "implementation complete",
    "changes have been made",
    "everything is working",
    "tests pass",
    "all tests pass",
];

const VERIFICATION_PHRASES: &[&str] = &[
    "please review",
    "ready for review",
    "let me know if",
    "should i",
    "would you like",
];

const NO_CHANGE_PHRASES: &[&str] = &[
    "no changes needed",
    "no further changes",
    "nothing left to do",
    "all requirements met",
];

/// Why the loop must stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// Completion accepted - terminal status `completed`
    Complete,
    /// Iteration ceiling reached - terminal status `timeout`
    MaxIterations,
    /// Too many recent errored iterations - terminal status `failed`
    ConsecutiveErrors,
    /// Identical responses, no progress - terminal status `failed`
    Stuck,
}

/// A stop verdict with its human-readable reason
#[derive(Debug, Clone)]
pub struct StopDecision {
    pub kind: StopKind,
    pub reason: String,
}

/// Detects when a Ralph task is complete
pub struct CompletionDetector {
    completion_promise: String,
}

impl CompletionDetector {
    pub fn new(completion_promise: impl Into<String>) -> Self {
        Self {
            completion_promise: completion_promise.into(),
        }
    }

    /// Look for the completion promise in a response.
    ///
    /// Checks the configured literal, the default literal, then the
    /// alternate patterns. Returns the matched literal.
    pub fn find_promise(&self, response: &str) -> Option<String> {
        if !self.completion_promise.is_empty() && response.contains(&self.completion_promise) {
            return Some(self.completion_promise.clone());
        }

        if response.contains(DEFAULT_COMPLETION_PROMISE) {
            return Some(DEFAULT_COMPLETION_PROMISE.to_string());
        }

        for pattern in ALT_PROMISE_PATTERNS.iter() {
            if let Some(m) = pattern.find(response) {
                return Some(m.as_str().to_string());
            }
        }

        None
    }

    /// Evaluate all completion signals for the iteration just recorded
    pub fn check_completion(&self, task: &RalphTask, iteration: &Iteration) -> CompletionResult {
        let mut result = CompletionResult::default();

        // Signal 1: explicit promise, confidence 1.0
        if let Some(matched) = self.find_promise(&iteration.agent_response) {
            result.promise_detected = true;
            result.is_complete = true;
            result.reason = format!("Completion promise detected: {}", matched);
            result.confidence = 1.0;
            return result;
        }

        // Signal 2: backpressure plus heuristics
        let all_passed = iteration.backpressure_results.iter().all(|r| r.passed);
        let bp_clean = iteration.backpressure_results.iter().all(|r| r.errors.is_empty());
        result.all_tests_passed = all_passed;

        let no_errors = bp_clean && !has_critical_error(iteration);
        result.no_errors = no_errors;

        let progress = analyze_progress(task, iteration);

        if all_passed && no_errors && progress.appears_complete {
            result.is_complete = true;
            result.reason = "All tests passed, no errors, task appears complete".to_string();
            result.confidence = progress.confidence;
        } else if !no_errors {
            result.reason = "Errors detected in iteration".to_string();
            result.confidence = 0.0;
        } else {
            result.reason = "Task still in progress".to_string();
            result.confidence = progress.confidence;
        }

        result
    }

    /// Determine whether the outer loop should stop, and why.
    ///
    /// Checked in order: completion, iteration ceiling, consecutive errors,
    /// stuck loop. Cancellation is observed by the loop itself.
    pub fn should_stop(&self, task: &RalphTask, completion: &CompletionResult) -> Option<StopDecision> {
        if completion.is_complete {
            return Some(StopDecision {
                kind: StopKind::Complete,
                reason: completion.reason.clone(),
            });
        }

        if task.current_iteration >= task.config.max_iterations {
            return Some(StopDecision {
                kind: StopKind::MaxIterations,
                reason: format!("Max iterations ({}) reached", task.config.max_iterations),
            });
        }

        if task.iterations.len() >= 5 {
            let recent_errors = task.iterations[task.iterations.len() - 5..]
                .iter()
                .filter(|i| i.error.is_some())
                .count();
            if recent_errors >= 4 {
                return Some(StopDecision {
                    kind: StopKind::ConsecutiveErrors,
                    reason: "Too many consecutive errors".to_string(),
                });
            }
        }

        if task.iterations.len() >= 3 {
            let prefixes: Vec<String> = task.iterations[task.iterations.len() - 3..]
                .iter()
                .map(|i| i.agent_response.chars().take(500).collect())
                .collect();
            if prefixes[0] == prefixes[1] && prefixes[1] == prefixes[2] {
                return Some(StopDecision {
                    kind: StopKind::Stuck,
                    reason: "Agent appears stuck (identical responses)".to_string(),
                });
            }
        }

        None
    }
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_PROMISE)
    }
}

/// Whether the iteration carries a critical error: an iteration-level error,
/// a tool call error, or an unexcluded error pattern in the response text.
fn has_critical_error(iteration: &Iteration) -> bool {
    if iteration.error.is_some() {
        return true;
    }
    if iteration.tool_calls.iter().any(|tc| tc.error.is_some()) {
        return true;
    }

    for pattern in CRITICAL_ERROR_PATTERNS.iter() {
        for matched in pattern.find_iter(&iteration.agent_response).take(3) {
            let lower = matched.as_str().to_lowercase();
            if !ERROR_EXCLUSIONS.iter().any(|skip| lower.contains(skip)) {
                return true;
            }
        }
    }

    false
}

struct ProgressCheck {
    appears_complete: bool,
    confidence: f64,
}

/// Accumulate confidence from completion-shaped phrasing and call patterns
fn analyze_progress(task: &RalphTask, iteration: &Iteration) -> ProgressCheck {
    let response = iteration.agent_response.to_lowercase();
    let mut confidence = 0.0f64;

    for phrase in COMPLETION_PHRASES {
        if response.contains(phrase) {
            confidence += 0.15;
        }
    }

    for phrase in VERIFICATION_PHRASES {
        if response.contains(phrase) {
            confidence += 0.10;
        }
    }

    for phrase in NO_CHANGE_PHRASES {
        if response.contains(phrase) {
            confidence += 0.20;
        }
    }

    // Only reads suggests the agent is verifying rather than still working
    if !iteration.tool_calls.is_empty() {
        let read_only = iteration
            .tool_calls
            .iter()
            .all(|tc| tc.tool_name.contains("read") || tc.tool_name.contains("get"));
        if read_only {
            confidence += 0.10;
        }
    }

    // Shrinking change sets hint at convergence
    if task.iterations.len() >= 2 {
        let prev = &task.iterations[task.iterations.len() - 2];
        if iteration.file_changes.len() < prev.file_changes.len() {
            confidence += 0.05;
        }
    }

    // Without an explicit promise, confidence never exceeds 0.7
    confidence = confidence.min(0.7);

    let appears_complete = confidence >= 0.5
        && iteration.error.is_none()
        && iteration.backpressure_results.iter().all(|bp| bp.passed);

    ProgressCheck {
        appears_complete,
        confidence,
    }
}
