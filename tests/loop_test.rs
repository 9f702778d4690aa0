//! End-to-end loop scenarios against a scripted LLM

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use ralphd::domain::{FileAction, RalphTask, TaskConfig, TaskStatus};
use ralphd::llm::{CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, StopReason, TokenUsage};
use ralphd::runner::TaskRunner;

/// Replays a fixed list of responses; optionally repeats the last one
/// forever, and can delay each reply to simulate a slow model.
struct ScriptedLlm {
    responses: Vec<CompletionResponse>,
    repeat_last: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses,
            repeat_last: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn repeating(responses: Vec<CompletionResponse>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(responses)
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let effective = if self.repeat_last {
            idx.min(self.responses.len().saturating_sub(1))
        } else {
            idx
        };
        self.responses
            .get(effective)
            .cloned()
            .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))
    }
}

fn text_reply(text: &str) -> CompletionResponse {
    CompletionResponse {
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage::default(),
    }
}

fn tool_reply(blocks: Vec<ContentBlock>) -> CompletionResponse {
    CompletionResponse {
        content: blocks,
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage::default(),
    }
}

fn base_config(dir: &std::path::Path) -> TaskConfig {
    TaskConfig {
        working_directory: dir.to_string_lossy().into_owned(),
        run_tests: false,
        run_lint: false,
        run_typecheck: false,
        include_git_history: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn immediate_completion() {
    let temp = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new(vec![text_reply("Done. <promise>COMPLETE</promise>")]));
    let runner = TaskRunner::new(llm, 1);

    let mut config = base_config(temp.path());
    config.max_iterations = 5;
    let task = RalphTask::new("Say done", "").with_config(config);

    let id = runner.submit(task).await;
    let finished = runner.wait(id).await.unwrap();

    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.current_iteration, 1);
    let completion = finished.completion_result.unwrap();
    assert!(completion.is_complete);
    assert_eq!(completion.confidence, 1.0);
    assert!(completion.promise_detected);
    assert!(finished.iterations[0].completion_promise_found);
}

#[tokio::test]
async fn tool_chain_then_completion() {
    let temp = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new(vec![
        tool_reply(vec![ContentBlock::tool_use(
            "tu_1",
            "write_file",
            serde_json::json!({"path": "a.txt", "content": "hi"}),
        )]),
        tool_reply(vec![
            ContentBlock::text("wrote file"),
            ContentBlock::tool_use("tu_2", "complete_task", serde_json::json!({"summary": "written"})),
        ]),
        text_reply(""),
    ]));
    let runner = TaskRunner::new(llm, 1);

    let task = RalphTask::new("Write a file then finish", "").with_config(base_config(temp.path()));
    let id = runner.submit(task).await;
    let finished = runner.wait(id).await.unwrap();

    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.current_iteration, 1);

    let iteration = &finished.iterations[0];
    assert_eq!(iteration.tool_calls.len(), 2);
    assert_eq!(iteration.tool_calls[0].tool_name, "write_file");
    assert_eq!(iteration.tool_calls[1].tool_name, "complete_task");

    assert_eq!(iteration.file_changes.len(), 1);
    assert_eq!(iteration.file_changes[0].path, "a.txt");
    assert_eq!(iteration.file_changes[0].action, FileAction::Create);

    assert_eq!(std::fs::read_to_string(temp.path().join("a.txt")).unwrap(), "hi");
    assert!(iteration.agent_response.contains("<promise>COMPLETE</promise>"));
    assert!(iteration.agent_response.contains("wrote file"));

    assert_eq!(finished.total_tool_calls, 2);
    assert_eq!(finished.total_file_changes, 1);
}

#[tokio::test]
async fn backpressure_blocks_completion() {
    let temp = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::repeating(vec![text_reply("all done")]));
    let runner = TaskRunner::new(llm, 1);

    let mut config = base_config(temp.path());
    config.run_tests = true;
    config.test_command = Some("exit 1".to_string());
    config.max_iterations = 2;
    let task = RalphTask::new("Make the suite green", "").with_config(config);

    let id = runner.submit(task).await;
    let finished = runner.wait(id).await.unwrap();

    // The failing check blocked completion and the loop kept going
    assert!(finished.current_iteration >= 2);
    assert_ne!(finished.status, TaskStatus::Completed);

    let first = &finished.iterations[0];
    assert_eq!(first.backpressure_results.len(), 1);
    assert!(!first.backpressure_results[0].passed);
    assert!(!first.completion_promise_found);
}

#[tokio::test]
async fn max_iterations_times_out() {
    let temp = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::repeating(vec![text_reply("working on it")]));
    let runner = TaskRunner::new(llm, 1);

    let mut config = base_config(temp.path());
    config.max_iterations = 3;
    let task = RalphTask::new("Never finishes on its own", "").with_config(config);

    let id = runner.submit(task).await;
    let finished = runner.wait(id).await.unwrap();

    assert_eq!(finished.status, TaskStatus::Timeout);
    assert_eq!(finished.current_iteration, 3);
    assert_eq!(finished.iterations.len(), 3);
    assert!(finished.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn cancellation_between_iterations() {
    let temp = tempdir().unwrap();
    let llm = Arc::new(
        ScriptedLlm::repeating(vec![text_reply("working through the steps")]).with_delay(Duration::from_secs(2)),
    );
    let runner = TaskRunner::new(llm, 1);

    let mut config = base_config(temp.path());
    config.max_iterations = 10;
    let task = RalphTask::new("Slow burning task", "").with_config(config);

    let id = runner.submit(task).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(runner.cancel(id).await);

    let finished = runner.wait(id).await.unwrap();

    // The in-flight iteration finished, then the loop observed the bit
    assert_eq!(finished.status, TaskStatus::Cancelled);
    assert_eq!(finished.current_iteration, 1);
    assert!(finished.completed_at.is_some());
}

#[tokio::test]
async fn stuck_loop_detection() {
    let temp = tempdir().unwrap();
    // Same 600+ char response every iteration
    let text = "Still analyzing the repository structure and planning what to adjust next. ".repeat(9);
    assert!(text.len() > 600);
    let llm = Arc::new(ScriptedLlm::repeating(vec![text_reply(&text)]));
    let runner = TaskRunner::new(llm, 1);

    let mut config = base_config(temp.path());
    config.max_iterations = 10;
    let task = RalphTask::new("Goes nowhere repeatedly", "").with_config(config);

    let id = runner.submit(task).await;
    let finished = runner.wait(id).await.unwrap();

    assert_eq!(finished.status, TaskStatus::Failed);
    assert_eq!(finished.current_iteration, 3);
    assert!(finished.error.as_deref().unwrap().contains("stuck"));
}

#[tokio::test]
async fn iteration_numbers_are_positional() {
    let temp = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::repeating(vec![text_reply("thinking it over")]));
    let runner = TaskRunner::new(llm, 1);

    let mut config = base_config(temp.path());
    config.max_iterations = 2;
    let task = RalphTask::new("Two rounds of nothing", "").with_config(config);

    let id = runner.submit(task).await;
    let finished = runner.wait(id).await.unwrap();

    for (i, iteration) in finished.iterations.iter().enumerate() {
        assert_eq!(iteration.iteration_number as usize, i + 1);
    }
    assert_eq!(
        finished.total_tool_calls,
        finished.iterations.iter().map(|i| i.tool_calls.len() as u64).sum::<u64>()
    );
}

#[tokio::test]
async fn llm_failure_is_an_iteration_error_not_a_crash() {
    let temp = tempdir().unwrap();
    // Script exhausts immediately: every turn errors. The iterations fail
    // one by one until a stop condition ends the task; the empty identical
    // responses trip the stuck detector at three.
    let llm = Arc::new(ScriptedLlm::new(vec![]));
    let runner = TaskRunner::new(llm, 1);

    let mut config = base_config(temp.path());
    config.max_iterations = 10;
    let task = RalphTask::new("Transport keeps failing", "").with_config(config);

    let id = runner.submit(task).await;
    let finished = runner.wait(id).await.unwrap();

    assert_eq!(finished.status, TaskStatus::Failed);
    assert_eq!(finished.current_iteration, 3);
    assert!(finished.iterations.iter().all(|i| i.error.is_some()));
    assert!(
        finished
            .iterations
            .iter()
            .all(|i| i.status == ralphd::domain::IterationStatus::Failed)
    );
}

#[tokio::test]
async fn events_stream_iteration_and_task_completion() {
    let temp = tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new(vec![text_reply("Done. <promise>COMPLETE</promise>")]));
    let runner = TaskRunner::new(llm, 1);
    let mut events = runner.subscribe();

    let task = RalphTask::new("Emit some events", "").with_config(base_config(temp.path()));
    let id = runner.submit(task).await;
    runner.wait(id).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.event_type().to_string());
    }

    assert_eq!(seen, vec!["TaskStarted", "IterationCompleted", "TaskCompleted"]);
}

#[tokio::test]
async fn concurrent_tasks_in_separate_directories() {
    let temp_a = tempdir().unwrap();
    let temp_b = tempdir().unwrap();

    let make = |dir: &std::path::Path| {
        RalphTask::new("Finish immediately please", "").with_config(base_config(dir))
    };

    let llm = Arc::new(ScriptedLlm::repeating(vec![text_reply("Done. <promise>COMPLETE</promise>")]));
    let runner = TaskRunner::new(llm, 2);

    let a = runner.submit(make(temp_a.path())).await;
    let b = runner.submit(make(temp_b.path())).await;

    let finished_a = runner.wait(a).await.unwrap();
    let finished_b = runner.wait(b).await.unwrap();

    assert_eq!(finished_a.status, TaskStatus::Completed);
    assert_eq!(finished_b.status, TaskStatus::Completed);
    assert_eq!(runner.completed_count().await, 2);
}
