//! LoopAgent - drives one task from running to a terminal state
//!
//! Each outer iteration assembles fresh context, runs one LLM turn with an
//! inner tool-use loop, executes backpressure, and asks the completion
//! detector whether to stop. Errors stay local to their iteration; only
//! stop conditions end the task.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::completion::{CompletionDetector, StopKind};
use crate::context::{ContextBuilder, TaskContext};
use crate::domain::{Iteration, IterationStatus, RalphTask, TaskConfig};
use crate::events::{EventBus, TaskEvent};
use crate::llm::{CompletionRequest, ContentBlock, LlmClient, LlmError, Message, StopReason, TokenUsage};
use crate::tools::{ToolContext, Toolkit};

use super::backpressure::run_backpressure;

/// Ceiling on LLM round-trips within one outer iteration
pub const MAX_TOOL_ROUNDS: usize = 10;

/// Pause between outer iterations
const ITERATION_DELAY: Duration = Duration::from_secs(1);

/// Drives a single task through the Ralph loop
pub struct LoopAgent {
    llm: Arc<dyn LlmClient>,
    events: Arc<EventBus>,
}

/// Outcome of one LLM turn including its inner tool-use loop
struct LlmTurn {
    response: String,
    reasoning: String,
    tool_calls: Vec<crate::domain::ToolCallRecord>,
    usage: TokenUsage,
}

impl LoopAgent {
    pub fn new(llm: Arc<dyn LlmClient>, events: Arc<EventBus>) -> Self {
        Self { llm, events }
    }

    /// Run the task to a terminal state, mutating it through the shared handle.
    ///
    /// Cancellation is cooperative: the flag is observed before each
    /// iteration, never mid-flight.
    pub async fn run(&self, shared: Arc<Mutex<RalphTask>>, cancel: Arc<AtomicBool>) {
        let (task_id, config) = {
            let mut task = shared.lock().await;
            task.start();
            (task.id, task.config.clone())
        };

        info!(%task_id, max_iterations = config.max_iterations, "starting Ralph task");
        self.events.emit(TaskEvent::TaskStarted { task_id });

        let working_dir = PathBuf::from(&config.working_directory);
        let toolkit = Toolkit::standard();
        let tool_ctx = ToolContext::new(working_dir.clone());
        let context_builder = ContextBuilder::new(working_dir.clone());
        let detector = CompletionDetector::new(&config.completion_promise);

        loop {
            if cancel.load(Ordering::SeqCst) {
                info!(%task_id, "cancellation observed, stopping");
                shared.lock().await.cancel();
                break;
            }

            let snapshot = shared.lock().await.clone();

            if snapshot.current_iteration >= config.max_iterations {
                shared.lock().await.timeout();
                break;
            }

            let iteration = self
                .run_iteration(&snapshot, &toolkit, &tool_ctx, &context_builder, &detector)
                .await;

            {
                let mut task = shared.lock().await;
                task.total_tokens_used += iteration.tokens_used;
                task.add_iteration(iteration.clone());
            }

            self.events.emit(TaskEvent::IterationCompleted {
                task_id,
                iteration: Box::new(iteration.clone()),
            });

            let snapshot = shared.lock().await.clone();
            let completion = detector.check_completion(&snapshot, &iteration);

            if let Some(decision) = detector.should_stop(&snapshot, &completion) {
                info!(%task_id, kind = ?decision.kind, reason = %decision.reason, "stop condition met");
                let mut task = shared.lock().await;
                match decision.kind {
                    StopKind::Complete => task.complete(completion, iteration.agent_response.clone()),
                    StopKind::MaxIterations => task.timeout(),
                    StopKind::ConsecutiveErrors | StopKind::Stuck => task.fail(decision.reason),
                }
                break;
            }

            tokio::time::sleep(ITERATION_DELAY).await;
        }

        let final_task = shared.lock().await.clone();
        info!(%task_id, status = %final_task.status, iterations = final_task.current_iteration, "Ralph task finished");
        self.events.emit(TaskEvent::TaskCompleted {
            task: Box::new(final_task),
        });
    }

    /// Run a single outer iteration
    async fn run_iteration(
        &self,
        task: &RalphTask,
        toolkit: &Toolkit,
        tool_ctx: &ToolContext,
        context_builder: &ContextBuilder,
        detector: &CompletionDetector,
    ) -> Iteration {
        let mut iteration = Iteration::new(task.current_iteration + 1);

        let context = context_builder.build(task).await;
        let prompt = build_iteration_prompt(task, &context);
        iteration.prompt_sent = prompt.clone();

        match self.run_llm_turn(&prompt, toolkit, tool_ctx, &task.config).await {
            Ok(turn) => {
                iteration.agent_response = turn.response;
                iteration.reasoning = turn.reasoning;
                iteration.tool_calls = turn.tool_calls;
                iteration.file_changes = tool_ctx.drain_changes().await;

                if let Some(matched) = detector.find_promise(&iteration.agent_response) {
                    iteration.completion_promise_found = true;
                    iteration.completion_message = Some(matched);
                }

                if task.config.backpressure_enabled() {
                    iteration.backpressure_results =
                        run_backpressure(&task.config, std::path::Path::new(&task.config.working_directory)).await;
                }

                iteration.tokens_used = turn.usage.total();
                iteration.finish(IterationStatus::Completed);
            }
            Err(e) => {
                warn!(error = %e, "iteration errored");
                // Drain so a half-made change set cannot leak into the next
                // iteration's buffer
                iteration.file_changes = tool_ctx.drain_changes().await;
                iteration.error = Some(e.to_string());
                iteration.finish(IterationStatus::Failed);
            }
        }

        iteration
    }

    /// One LLM turn: call, execute emitted tools, feed results back, repeat
    /// until the model stops calling tools or the round ceiling is hit.
    async fn run_llm_turn(
        &self,
        prompt: &str,
        toolkit: &Toolkit,
        tool_ctx: &ToolContext,
        config: &TaskConfig,
    ) -> Result<LlmTurn, LlmError> {
        let tool_defs = toolkit.definitions();
        let mut messages = vec![Message::user(prompt)];

        let mut response_text = String::new();
        let mut reasoning = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = TokenUsage::default();

        for _round in 0..MAX_TOOL_ROUNDS {
            let request = CompletionRequest {
                model: config.model.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                messages: messages.clone(),
                tools: tool_defs.clone(),
            };

            let reply = self.llm.complete(request).await?;
            usage.input_tokens += reply.usage.input_tokens;
            usage.output_tokens += reply.usage.output_tokens;

            let mut assistant_blocks = Vec::new();
            let mut result_blocks = Vec::new();

            // Blocks are processed, and tools executed, in emission order
            for block in &reply.content {
                match block {
                    ContentBlock::Text { text } => {
                        response_text.push_str(text);
                        response_text.push('\n');
                        // Last block containing "reasoning:" wins
                        if text.to_lowercase().contains("reasoning:") {
                            reasoning = text.clone();
                        }
                        assistant_blocks.push(block.clone());
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        assistant_blocks.push(block.clone());

                        let record = toolkit.execute(name, input.clone(), tool_ctx).await;

                        let content = match (&record.result, &record.error) {
                            (Some(value), _) => {
                                serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
                            }
                            (None, Some(error)) => serde_json::json!({ "error": error }).to_string(),
                            (None, None) => "{}".to_string(),
                        };
                        result_blocks.push(ContentBlock::tool_result(id.clone(), content, record.error.is_some()));

                        if name == "complete_task" {
                            let summary = input.get("summary").and_then(|s| s.as_str()).unwrap_or_default();
                            response_text.push_str(&format!("\n{}\nSummary: {}", config.completion_promise, summary));
                        }

                        tool_calls.push(record);
                    }
                    // The model never emits tool_result blocks
                    ContentBlock::ToolResult { .. } => {}
                }
            }

            let had_tool_use = !result_blocks.is_empty();
            if had_tool_use {
                messages.push(Message::assistant_blocks(assistant_blocks));
                messages.push(Message::user_blocks(result_blocks));
            }

            if !had_tool_use || reply.stop_reason == StopReason::EndTurn {
                break;
            }
        }

        Ok(LlmTurn {
            response: response_text.trim().to_string(),
            reasoning,
            tool_calls,
            usage,
        })
    }
}

/// Fixed prompt shape; task-specific values substituted each iteration
fn build_iteration_prompt(task: &RalphTask, context: &TaskContext) -> String {
    format!(
        "You are an AI coding agent working on a task. You will iterate on this task until it is complete.\n\
         \n\
         YOUR TASK:\n\
         {prompt}\n\
         \n\
         {context}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Analyze the current state based on the context above\n\
         2. Determine what needs to be done next\n\
         3. Use the available tools to make progress\n\
         4. If you encounter errors, analyze them and try a different approach\n\
         5. When ALL requirements are met and tests pass, call the complete_task tool with a summary\n\
         \n\
         IMPORTANT:\n\
         - Learn from previous iterations - don't repeat the same mistakes\n\
         - If tests are failing, read the error messages carefully and fix the issues\n\
         - Make small, incremental changes rather than large rewrites\n\
         - When the task is truly complete, signal completion with: {promise}\n\
         \n\
         What is your next action?",
        prompt = task.prompt,
        context = context.format_for_prompt(),
        promise = task.config.completion_promise,
    )
}
