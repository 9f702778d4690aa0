//! TaskRunner - bounded-concurrency supervisor for Ralph tasks
//!
//! Accepts tasks, runs each on its own tokio task gated by a semaphore,
//! and retains finished tasks in a completed registry. `status`, `cancel`,
//! and `wait` operate on the running map and the registry under a mutex;
//! cancellation is a cooperative bit the loop observes between iterations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Semaphore, broadcast, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{RalphTask, TaskStatus, TaskSummary};
use crate::events::{EventBus, TaskEvent};
use crate::llm::LlmClient;
use crate::r#loop::LoopAgent;

/// Default cap on simultaneously running tasks
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 5;

struct RunningEntry {
    task: Arc<Mutex<RalphTask>>,
    cancel: Arc<AtomicBool>,
    done_rx: watch::Receiver<bool>,
}

/// Supervises concurrent Ralph tasks
pub struct TaskRunner {
    llm: Arc<dyn LlmClient>,
    events: Arc<EventBus>,
    semaphore: Arc<Semaphore>,
    running: Arc<Mutex<HashMap<Uuid, RunningEntry>>>,
    completed: Arc<Mutex<HashMap<Uuid, RalphTask>>>,
}

impl TaskRunner {
    pub fn new(llm: Arc<dyn LlmClient>, max_concurrent_tasks: usize) -> Self {
        Self {
            llm,
            events: Arc::new(EventBus::default()),
            semaphore: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
            running: Arc::new(Mutex::new(HashMap::new())),
            completed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to the runner's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Submit a task for execution. Returns immediately with the task id;
    /// the task queues on the semaphore if the runner is saturated.
    pub async fn submit(&self, task: RalphTask) -> Uuid {
        let id = task.id;
        let shared = Arc::new(Mutex::new(task));
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = watch::channel(false);

        self.running.lock().await.insert(
            id,
            RunningEntry {
                task: shared.clone(),
                cancel: cancel.clone(),
                done_rx,
            },
        );

        let semaphore = self.semaphore.clone();
        let llm = self.llm.clone();
        let events = self.events.clone();
        let running = self.running.clone();
        let completed = self.completed.clone();

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(%id, "semaphore closed before task could start");
                    return;
                }
            };

            let agent = LoopAgent::new(llm, events);
            agent.run(shared.clone(), cancel).await;

            let final_task = shared.lock().await.clone();
            completed.lock().await.insert(id, final_task);
            running.lock().await.remove(&id);
            let _ = done_tx.send(true);
        });

        info!(%id, "task submitted");
        id
    }

    /// Snapshot of a task's current state, running or completed
    pub async fn status(&self, id: Uuid) -> Option<TaskSummary> {
        if let Some(task) = self.completed.lock().await.get(&id) {
            return Some(task.summary());
        }
        if let Some(entry) = self.running.lock().await.get(&id) {
            return Some(entry.task.lock().await.summary());
        }
        None
    }

    /// Request cancellation. Returns true if the task was known and still
    /// running; the loop observes the bit before its next iteration.
    pub async fn cancel(&self, id: Uuid) -> bool {
        if let Some(entry) = self.running.lock().await.get(&id) {
            if entry.task.lock().await.is_terminal() {
                return false;
            }
            entry.cancel.store(true, Ordering::SeqCst);
            info!(%id, "cancellation requested");
            true
        } else {
            false
        }
    }

    /// Block until the task reaches a terminal state and return it.
    /// Idempotent after termination; `None` for unknown ids.
    pub async fn wait(&self, id: Uuid) -> Option<RalphTask> {
        let rx = self.running.lock().await.get(&id).map(|entry| entry.done_rx.clone());

        if let Some(mut rx) = rx {
            // A receive error means the loop task ended without signaling;
            // fall through to the registry either way
            let _ = rx.wait_for(|done| *done).await;
        }

        self.completed.lock().await.get(&id).cloned()
    }

    /// Task summaries, newest first, optionally filtered by status
    pub async fn list(&self, status: Option<TaskStatus>, limit: usize) -> Vec<TaskSummary> {
        let mut summaries: Vec<TaskSummary> = Vec::new();

        for task in self.completed.lock().await.values() {
            summaries.push(task.summary());
        }
        for entry in self.running.lock().await.values() {
            summaries.push(entry.task.lock().await.summary());
        }

        if let Some(wanted) = status {
            summaries.retain(|s| s.status == wanted);
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries.truncate(limit);
        summaries
    }

    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }

    pub async fn completed_count(&self) -> usize {
        self.completed.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskConfig;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{CompletionResponse, ContentBlock, StopReason, TokenUsage};
    use tempfile::tempdir;

    fn completing_reply() -> CompletionResponse {
        CompletionResponse {
            content: vec![ContentBlock::text("Done. <promise>COMPLETE</promise>")],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    fn quiet_task(dir: &std::path::Path) -> RalphTask {
        RalphTask::new("Say that you are done", "").with_config(TaskConfig {
            working_directory: dir.to_string_lossy().into_owned(),
            run_tests: false,
            run_lint: false,
            run_typecheck: false,
            include_git_history: false,
            include_file_contents: false,
            max_iterations: 3,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let temp = tempdir().unwrap();
        let runner = TaskRunner::new(Arc::new(MockLlmClient::new(vec![completing_reply()])), 2);

        let id = runner.submit(quiet_task(temp.path())).await;
        let task = runner.wait(id).await.expect("task should finish");

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(runner.running_count().await, 0);
        assert_eq!(runner.completed_count().await, 1);
    }

    #[tokio::test]
    async fn test_wait_is_idempotent() {
        let temp = tempdir().unwrap();
        let runner = TaskRunner::new(Arc::new(MockLlmClient::new(vec![completing_reply()])), 2);

        let id = runner.submit(quiet_task(temp.path())).await;
        let first = runner.wait(id).await.unwrap();
        let second = runner.wait(id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, second.status);
    }

    #[tokio::test]
    async fn test_status_unknown_id() {
        let runner = TaskRunner::new(Arc::new(MockLlmClient::new(vec![])), 1);
        assert!(runner.status(Uuid::new_v4()).await.is_none());
        assert!(runner.wait(Uuid::new_v4()).await.is_none());
        assert!(!runner.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_status_reflects_completion() {
        let temp = tempdir().unwrap();
        let runner = TaskRunner::new(Arc::new(MockLlmClient::new(vec![completing_reply()])), 2);

        let id = runner.submit(quiet_task(temp.path())).await;
        runner.wait(id).await.unwrap();

        let summary = runner.status(id).await.unwrap();
        assert_eq!(summary.status, TaskStatus::Completed);
        assert!(summary.is_complete);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_returns_false() {
        let temp = tempdir().unwrap();
        let runner = TaskRunner::new(Arc::new(MockLlmClient::new(vec![completing_reply()])), 2);

        let id = runner.submit(quiet_task(temp.path())).await;
        runner.wait(id).await.unwrap();

        assert!(!runner.cancel(id).await);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let temp_a = tempdir().unwrap();
        let temp_b = tempdir().unwrap();
        let runner = TaskRunner::new(
            Arc::new(MockLlmClient::new(vec![completing_reply(), completing_reply()])),
            1,
        );

        let first = runner.submit(quiet_task(temp_a.path())).await;
        runner.wait(first).await.unwrap();
        let second = runner.submit(quiet_task(temp_b.path())).await;
        runner.wait(second).await.unwrap();

        let listed = runner.list(None, 10).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[1].id, first);

        let completed_only = runner.list(Some(TaskStatus::Completed), 10).await;
        assert_eq!(completed_only.len(), 2);
        let failed_only = runner.list(Some(TaskStatus::Failed), 10).await;
        assert!(failed_only.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_respects_semaphore() {
        // With one slot and two tasks, both finish; the second queues
        let temp_a = tempdir().unwrap();
        let temp_b = tempdir().unwrap();
        let runner = TaskRunner::new(
            Arc::new(MockLlmClient::new(vec![completing_reply(), completing_reply()])),
            1,
        );

        let a = runner.submit(quiet_task(temp_a.path())).await;
        let b = runner.submit(quiet_task(temp_b.path())).await;

        assert!(runner.wait(a).await.is_some());
        assert!(runner.wait(b).await.is_some());
        assert_eq!(runner.completed_count().await, 2);
    }
}
