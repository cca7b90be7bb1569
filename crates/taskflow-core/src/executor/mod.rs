//! Drives one plan to completion.
//!
//! Steps run strictly in order. Each step's lifecycle is published on the
//! session's [`EventBus`], its tool is invoked through the [`ToolGateway`],
//! and any files its result mentions are handed to the
//! [`ArtifactRegistry`]. A failed non-final step is logged and execution
//! continues; a failed final step halts the plan.
//!
//! [`StepExecutor::execute`] never fails: internal errors are folded into
//! the returned [`ExecutionResult`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::artifacts::ArtifactRegistry;
use crate::error::{OrchestratorError, Result};
use crate::events::{render::describe_result, EventBus, EventKind};
use crate::gateway::ToolGateway;
use crate::models::{
    ExecutionResult, StepOutcome, StepStatus, Task, TaskStatus, CHAT_RESPONSE_TOOL,
};

/// Tool that receives the task directory as `output_dir` by default.
pub const FILE_GENERATION_TOOL: &str = "file_generation_tool";

/// Error message recorded when a task is cancelled mid-plan.
pub const CANCELLED_MESSAGE: &str = "task cancelled";

/// A task shared between its executor and status readers.
pub type SharedTask = Arc<Mutex<Task>>;

/// Wraps a task for execution.
pub fn shared(task: Task) -> SharedTask {
    Arc::new(Mutex::new(task))
}

/// Locks a shared task, recovering from poisoning.
pub fn lock_task(task: &SharedTask) -> MutexGuard<'_, Task> {
    task.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Per-run inputs that belong to the submitting session.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub user_id: String,
    pub events: Arc<EventBus>,
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(user_id: impl Into<String>, events: Arc<EventBus>) -> Self {
        Self {
            user_id: user_id.into(),
            events,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

enum RunEnd {
    Finished,
    Cancelled,
}

#[derive(Default)]
struct RunState {
    results: Vec<StepOutcome>,
    files: Vec<std::path::PathBuf>,
}

/// Executes plans against a gateway and artifact registry.
#[derive(Debug)]
pub struct StepExecutor {
    gateway: Arc<ToolGateway>,
    artifacts: Arc<ArtifactRegistry>,
    file_tools: HashSet<String>,
}

impl StepExecutor {
    pub fn new(gateway: Arc<ToolGateway>, artifacts: Arc<ArtifactRegistry>) -> Self {
        Self {
            gateway,
            artifacts,
            file_tools: HashSet::from([FILE_GENERATION_TOOL.to_string()]),
        }
    }

    /// Replaces the set of tools that get `output_dir` injected.
    pub fn with_file_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_tools = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn artifacts(&self) -> &Arc<ArtifactRegistry> {
        &self.artifacts
    }

    /// Runs the task's plan and returns its result snapshot.
    pub async fn execute(&self, task: &SharedTask, ctx: &ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let (task_id, is_conversation) = {
            let t = lock_task(task);
            (t.task_id.clone(), t.is_conversation)
        };

        if is_conversation {
            return execute_conversation(task, started);
        }

        log::info!("Executing task {task_id}");
        let mut run = RunState::default();
        let end = self.run_steps(task, ctx, &mut run).await;
        let execution_time = started.elapsed().as_secs_f64();

        let (success, error_message, status) = match end {
            Ok(RunEnd::Finished) => {
                let success = run.results.iter().all(|r| r.status != StepStatus::Failed);
                let status = if success {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                };
                (success, None, status)
            }
            Ok(RunEnd::Cancelled) => (
                false,
                Some(CANCELLED_MESSAGE.to_string()),
                TaskStatus::Cancelled,
            ),
            Err(e) => {
                log::error!("Task {task_id} aborted: {e}");
                (false, Some(e.to_string()), TaskStatus::Failed)
            }
        };

        {
            let mut t = lock_task(task);
            t.status = status;
            t.generated_files = run
                .files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
        }

        let result = ExecutionResult {
            task_id: task_id.clone(),
            success,
            results: run.results,
            error_message,
            execution_time,
            files_generated: run.files,
        };

        ctx.events.publish(
            EventKind::TaskComplete,
            json!({
                "task_id": task_id,
                "success": result.success,
                "execution_time": result.execution_time,
                "files_generated": result.files_generated,
            }),
        );

        if !result.files_generated.is_empty() {
            self.package(&task_id, &ctx.user_id).await;
        }

        log::info!(
            "Task {task_id} finished in {:.2}s with {} files",
            result.execution_time,
            result.files_generated.len()
        );
        result
    }

    async fn run_steps(
        &self,
        task: &SharedTask,
        ctx: &ExecutionContext,
        run: &mut RunState,
    ) -> Result<RunEnd> {
        let (task_id, step_count, start_data) = {
            let t = lock_task(task);
            let data = json!({
                "task_id": t.task_id,
                "description": t.user_input,
                "total_steps": t.plan.len(),
                "task_type": t.task_type,
            });
            (t.task_id.clone(), t.plan.len(), data)
        };
        ctx.events.publish(EventKind::TaskStart, start_data);

        let task_dir = self
            .artifacts
            .create_task_directory(&task_id, &ctx.user_id)?;
        lock_task(task).status = TaskStatus::Executing;

        for index in 0..step_count {
            if ctx.cancel.is_cancelled() {
                skip_remaining(task, index)?;
                log::warn!("Task {task_id} cancelled before step {}", index + 1);
                return Ok(RunEnd::Cancelled);
            }

            let step = {
                let mut t = lock_task(task);
                let step = t.plan.steps.get_mut(index).ok_or_else(|| {
                    OrchestratorError::task_execution(format!("step {index} vanished from plan"))
                })?;
                if self.file_tools.contains(&step.tool_name) {
                    step.arguments.insert(
                        "output_dir".to_string(),
                        Value::String(task_dir.display().to_string()),
                    );
                }
                step.start()?;
                step.clone()
            };

            log::info!(
                "Executing step {}/{step_count}: {}",
                index + 1,
                step.description
            );
            ctx.events.publish(
                EventKind::StepStart,
                json!({
                    "step_id": step.step_id,
                    "description": step.description,
                    "tool_name": step.tool_name,
                }),
            );
            ctx.events.publish(
                EventKind::ToolCallStart,
                json!({"tool_name": step.tool_name, "args": step.arguments}),
            );

            let call_started = Instant::now();
            let outcome = if step.tool_name == CHAT_RESPONSE_TOOL {
                Ok(chat_response(&step.arguments))
            } else {
                self.gateway
                    .call(&step.tool_name, step.arguments.clone())
                    .await
            };
            let duration = call_started.elapsed().as_secs_f64();

            let (raw, success) = match &outcome {
                Ok(value) => (value.clone(), true),
                Err(e) => (json!({ "error": e.to_string() }), false),
            };
            ctx.events.publish(
                EventKind::ToolCallComplete,
                json!({
                    "tool_name": step.tool_name,
                    "result": raw,
                    "success": success,
                    "duration": duration,
                }),
            );

            let finished = {
                let mut t = lock_task(task);
                let current = &mut t.plan.steps[index];
                match outcome {
                    Ok(value) => current.complete(value)?,
                    Err(e) => current.fail(e.to_string())?,
                }
                current.clone()
            };
            run.results.push(StepOutcome::from(&finished));

            ctx.events.publish(
                EventKind::StepComplete,
                json!({
                    "step_id": finished.step_id,
                    "result": describe_result(&raw),
                    "status": finished.status,
                }),
            );

            let files = self.artifacts.extract_from_result(
                &task_id,
                &raw,
                &finished.tool_name,
                &finished.step_id,
                &finished.description,
            );
            for file in files {
                if run.files.contains(&file) {
                    continue;
                }
                if let Some(record) = self
                    .artifacts
                    .files(&task_id)
                    .into_iter()
                    .find(|r| r.resolved_path == file)
                {
                    ctx.events.publish(
                        EventKind::FileRegistered,
                        json!({
                            "file_name": record.display_name,
                            "file_type": record.type_tag,
                            "description": record.description,
                            "message": format!("Registered {} ({})", record.display_name, record.type_tag),
                        }),
                    );
                }
                run.files.push(file);
            }

            if finished.status == StepStatus::Failed {
                let message = finished.error.as_deref().unwrap_or_default();
                if finished.is_final {
                    log::error!("Final step failed, halting plan: {message}");
                    break;
                }
                log::warn!("Step failed, continuing: {message}");
            }
        }

        Ok(RunEnd::Finished)
    }

    async fn package(&self, task_id: &str, user_id: &str) {
        let artifacts = Arc::clone(&self.artifacts);
        let (task, user) = (task_id.to_string(), user_id.to_string());
        let packaged = tokio::task::spawn_blocking(move || artifacts.package(&task, &user))
            .await
            .map_err(OrchestratorError::join);

        match packaged {
            Ok(Ok(Some(path))) => log::info!("Download package ready: {}", path.display()),
            Ok(Ok(None)) => {}
            Ok(Err(e)) | Err(e) => log::error!("Packaging task {task_id} failed: {e}"),
        }
    }
}

fn chat_response(arguments: &Map<String, Value>) -> Value {
    json!({
        "type": "chat_response",
        "response": arguments.get("response").cloned().unwrap_or_else(|| json!("")),
        "success": true,
    })
}

fn skip_remaining(task: &SharedTask, from: usize) -> Result<()> {
    let mut t = lock_task(task);
    for step in t.plan.steps.iter_mut().skip(from) {
        if step.status == StepStatus::Pending {
            step.skip()?;
        }
    }
    Ok(())
}

/// Conversation tasks echo their precomputed reply without touching tools,
/// artifacts or the event bus.
fn execute_conversation(task: &SharedTask, started: Instant) -> ExecutionResult {
    let mut t = lock_task(task);
    let mut results = Vec::new();
    let mut error_message = None;

    for step in t.plan.steps.iter_mut() {
        if step.tool_name != CHAT_RESPONSE_TOOL {
            continue;
        }
        let reply = chat_response(&step.arguments);
        if let Err(e) = step.start().and_then(|()| step.complete(reply)) {
            error_message = Some(e.to_string());
            break;
        }
        results.push(StepOutcome::from(&*step));
    }

    let success = error_message.is_none();
    t.status = if success {
        TaskStatus::Completed
    } else {
        TaskStatus::Failed
    };

    ExecutionResult {
        task_id: t.task_id.clone(),
        success,
        results,
        error_message,
        execution_time: started.elapsed().as_secs_f64(),
        files_generated: Vec::new(),
    }
}
