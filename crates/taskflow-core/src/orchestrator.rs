//! Session-facing facade wiring intake, execution and reporting together.
//!
//! An [`Orchestrator`] is cheap to clone; clones share the same session
//! registry, artifact registry and tool gateway. Build one with
//! [`OrchestratorBuilder`]:
//!
//! ```rust,no_run
//! use taskflow_core::OrchestratorBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = OrchestratorBuilder::new()
//!     .with_data_dir(Some("/tmp/taskflow"))
//!     .build()
//!     .await?;
//!
//! let outcome = orchestrator.run("alice", "summarize the news").await?;
//! println!("{:?}", outcome.result.map(|r| r.success));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};

use crate::artifacts::{path_segment, ArtifactRegistry, SearchPathPolicy};
use crate::error::{OrchestratorError, Result, ResultExt};
use crate::events::{Event, EventBus, EventKind, SubscriptionId};
use crate::executor::{lock_task, shared, ExecutionContext, SharedTask, StepExecutor};
use crate::gateway::{LocalTransport, ToolGateway, ToolSpec, ToolTransport};
use crate::intake::{FallbackPlanSource, PlanIntake, PlanSource};
use crate::models::{
    ArtifactSummary, ChatMessage, ExecutionResult, MessageKind, StepStatus, Task, TaskProgress,
};
use crate::report::{HistoryEntry, ReportFormat, ResultReporter};
use crate::session::{
    lock_session, SessionInfo, SessionRegistry, SharedSession, TaskClaim, DEFAULT_HISTORY_CAP,
};

/// What a finished `run` produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Task snapshot after execution
    pub task: Task,
    /// Absent when the request needs clarification first
    pub result: Option<ExecutionResult>,
    /// Saved report per format; empty for conversation tasks
    pub reports: BTreeMap<ReportFormat, PathBuf>,
}

/// One page of a user's chat history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatPage {
    pub user_id: String,
    pub total_messages: usize,
    pub offset: usize,
    pub limit: usize,
    pub messages: Vec<ChatMessage>,
}

/// Builder for creating and configuring [`Orchestrator`] instances.
pub struct OrchestratorBuilder {
    data_dir: Option<PathBuf>,
    transport: Option<Arc<dyn ToolTransport>>,
    plan_source: Option<Arc<dyn PlanSource>>,
    file_tools: Option<Vec<String>>,
    search_paths: SearchPathPolicy,
    report_formats: Vec<ReportFormat>,
    history_cap: usize,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            data_dir: None,
            transport: None,
            plan_source: None,
            file_tools: None,
            search_paths: SearchPathPolicy::default(),
            report_formats: vec![ReportFormat::Json],
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }

    /// Sets the directory holding `artifacts/` and `results/`.
    ///
    /// If not specified, uses the XDG data directory:
    /// `$XDG_DATA_HOME/taskflow` or `~/.local/share/taskflow`
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.data_dir = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Transport used to reach tools. Defaults to an empty local catalog.
    pub fn with_transport(mut self, transport: Arc<dyn ToolTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Planner behind intake. Defaults to the single-step fallback plan.
    pub fn with_plan_source(mut self, source: Arc<dyn PlanSource>) -> Self {
        self.plan_source = Some(source);
        self
    }

    pub fn with_file_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_tools = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_search_paths(mut self, policy: SearchPathPolicy) -> Self {
        self.search_paths = policy;
        self
    }

    pub fn with_report_formats(mut self, formats: Vec<ReportFormat>) -> Self {
        self.report_formats = formats;
        self
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    /// Builds the orchestrator, creating its storage directories.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::FileSystem` if a directory cannot be created
    /// Returns `OrchestratorError::Configuration` if no data directory is known
    pub async fn build(self) -> Result<Orchestrator> {
        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => Self::default_data_dir()?,
        };

        let search_paths = self.search_paths;
        let artifacts_dir = data_dir.join("artifacts");
        let results_dir = data_dir.join("results");
        let (artifacts, reporter) = task::spawn_blocking(move || {
            let artifacts = ArtifactRegistry::new(artifacts_dir)?.with_search_paths(search_paths);
            let reporter = ResultReporter::new(results_dir)?;
            Ok::<_, OrchestratorError>((artifacts, reporter))
        })
        .await
        .map_err(OrchestratorError::join)??;

        let artifacts = Arc::new(artifacts);
        let reporter = Arc::new(reporter.with_artifacts(Arc::clone(&artifacts)));

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(LocalTransport::new()));
        let gateway = Arc::new(ToolGateway::new(transport));

        let mut executor = StepExecutor::new(Arc::clone(&gateway), Arc::clone(&artifacts));
        if let Some(names) = self.file_tools {
            executor = executor.with_file_tools(names);
        }

        let source = self
            .plan_source
            .unwrap_or_else(|| Arc::new(FallbackPlanSource));
        let intake = PlanIntake::new(source).with_gateway(Arc::clone(&gateway));

        log::info!("Orchestrator data directory: {}", data_dir.display());
        Ok(Orchestrator {
            inner: Arc::new(Inner {
                data_dir,
                sessions: SessionRegistry::with_history_cap(self.history_cap),
                intake,
                executor,
                gateway,
                artifacts,
                reporter,
                report_formats: self.report_formats,
            }),
        })
    }

    fn default_data_dir() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("taskflow")
            .create_data_directory("")
            .with_context("Failed to create XDG data directory")
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    data_dir: PathBuf,
    sessions: SessionRegistry,
    intake: PlanIntake,
    executor: StepExecutor,
    gateway: Arc<ToolGateway>,
    artifacts: Arc<ArtifactRegistry>,
    reporter: Arc<ResultReporter>,
    report_formats: Vec<ReportFormat>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    pub fn artifacts(&self) -> &Arc<ArtifactRegistry> {
        &self.inner.artifacts
    }

    /// Starts processing `text` for `user_id` in the background.
    ///
    /// The user's task slot is claimed before this returns, so any task the
    /// user still has in flight or in planning is cancelled, and a later
    /// submission always wins over this one. The returned handle resolves
    /// once the new task is finished.
    pub fn submit(&self, user_id: &str, text: &str) -> Result<JoinHandle<Result<RunOutcome>>> {
        validate(user_id, text)?;
        let (session, claim) = self.claim(user_id);

        let this = self.clone();
        let (user, input) = (user_id.to_string(), text.to_string());
        Ok(tokio::spawn(async move {
            this.process(&user, &input, session, claim).await
        }))
    }

    /// Processes `text` for `user_id` and waits for the outcome.
    pub async fn run(&self, user_id: &str, text: &str) -> Result<RunOutcome> {
        validate(user_id, text)?;
        let (session, claim) = self.claim(user_id);
        self.process(user_id, text, session, claim).await
    }

    fn claim(&self, user_id: &str) -> (SharedSession, TaskClaim) {
        let session = self.inner.sessions.get_or_create(user_id);
        let claim = lock_session(&session).claim();
        (session, claim)
    }

    async fn process(
        &self,
        user_id: &str,
        text: &str,
        session: SharedSession,
        claim: TaskClaim,
    ) -> Result<RunOutcome> {
        let events = {
            let mut s = lock_session(&session);
            s.add_message(ChatMessage::user(text));
            Arc::clone(s.events())
        };

        let task = self.inner.intake.analyze(text, &events).await;
        if task.requires_clarification() {
            let content = std::iter::once("I need a few details first:".to_string())
                .chain(task.clarification_questions.iter().map(|q| format!("• {q}")))
                .collect::<Vec<_>>()
                .join("\n");
            let mut s = lock_session(&session);
            s.release(&claim);
            s.add_message(
                ChatMessage::assistant(content, MessageKind::Clarification).with_task(&task.task_id),
            );
            return Ok(RunOutcome {
                task,
                result: None,
                reports: BTreeMap::new(),
            });
        }

        let task_id = task.task_id.clone();
        let is_conversation = task.is_conversation;
        let plan_message = format!(
            "Plan ready\nType: {}\nComplexity: {}\nSteps: {}",
            task.task_type,
            task.complexity,
            task.plan.len()
        );
        let task = shared(task);
        if !lock_session(&session).begin_task(Arc::clone(&task), &claim) {
            log::info!("Task {task_id} for {user_id} was superseded while planning");
        }

        if !is_conversation {
            lock_session(&session).add_message(
                ChatMessage::assistant(plan_message, MessageKind::TaskPlan).with_task(&task_id),
            );
        }

        let ctx = ExecutionContext::new(user_id, Arc::clone(&events))
            .with_cancel(claim.token().clone());
        let result = self.inner.executor.execute(&task, &ctx).await;
        let snapshot = lock_task(&task).clone();

        let reports = if is_conversation {
            let reply = result
                .results
                .first()
                .and_then(|r| r.result.get("response"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            lock_session(&session).add_message(
                ChatMessage::assistant(reply, MessageKind::Conversation).with_task(&task_id),
            );
            BTreeMap::new()
        } else {
            let reports = self.persist_reports(&result, &snapshot, &events).await;
            let message = self.result_message(&result, &reports);
            let kind = if result.success {
                MessageKind::TaskResult
            } else {
                MessageKind::Error
            };
            lock_session(&session)
                .add_message(ChatMessage::assistant(message, kind).with_task(&task_id));
            reports
        };

        lock_session(&session).finish_task(&task_id, result.clone());
        Ok(RunOutcome {
            task: snapshot,
            result: Some(result),
            reports,
        })
    }

    /// Builds and saves the report. Failures are logged, not returned.
    async fn persist_reports(
        &self,
        result: &ExecutionResult,
        task: &Task,
        events: &EventBus,
    ) -> BTreeMap<ReportFormat, PathBuf> {
        events.publish(
            EventKind::ResultCollectionStart,
            json!({"task_id": task.task_id, "message": "Collecting results"}),
        );
        let report = self.inner.reporter.build(result, task);
        let formats = self.inner.report_formats.clone();
        events.publish(
            EventKind::ReportGenerationStart,
            json!({
                "formats": formats,
                "message": format!("Generating {} report(s)", formats.len()),
            }),
        );

        let reporter = Arc::clone(&self.inner.reporter);
        let (raw_result, raw_task) = (result.clone(), task.clone());
        let saved = task::spawn_blocking(move || {
            let saved = reporter.save(&report, &formats)?;
            reporter.save_raw(&raw_result, &raw_task)?;
            Ok::<_, OrchestratorError>(saved)
        })
        .await
        .map_err(OrchestratorError::join);

        match saved {
            Ok(Ok(saved)) => {
                for (format, path) in &saved {
                    events.publish(
                        EventKind::ReportSaved,
                        json!({
                            "format": format,
                            "path": path,
                            "message": format!("Saved {format} report"),
                        }),
                    );
                }
                saved
            }
            Ok(Err(e)) | Err(e) => {
                log::error!("Saving report for task {} failed: {e}", task.task_id);
                BTreeMap::new()
            }
        }
    }

    fn result_message(
        &self,
        result: &ExecutionResult,
        reports: &BTreeMap<ReportFormat, PathBuf>,
    ) -> String {
        if !result.success {
            let mut message = "Task failed".to_string();
            if let Some(error) = &result.error_message {
                message.push_str(&format!("\nError: {error}"));
            }
            for failed in result.results.iter().filter(|r| r.status == StepStatus::Failed) {
                let error = failed.result["error"].as_str().unwrap_or("unknown error");
                message.push_str(&format!("\n• {}: {error}", failed.description));
            }
            return message;
        }

        let mut lines = vec![
            "Task completed".to_string(),
            format!("Execution time: {:.2}s", result.execution_time),
        ];
        match self.inner.artifacts.summary(&result.task_id) {
            Some(summary) if summary.file_count > 0 => {
                lines.push(format!("Files: {}", summary.file_count));
                for file in &summary.files {
                    lines.push(format!("• {} ({}, {} bytes)", file.name, file.type_tag, file.size));
                }
            }
            _ => {
                for path in &result.files_generated {
                    lines.push(format!("• {}", path.display()));
                }
            }
        }
        for (format, path) in reports {
            lines.push(format!("Report ({format}): {}", path.display()));
        }
        lines.join("\n")
    }

    fn session(&self, user_id: &str) -> Result<SharedSession> {
        self.inner
            .sessions
            .get(user_id)
            .ok_or_else(|| OrchestratorError::SessionNotFound {
                user_id: user_id.to_string(),
            })
    }

    fn current_task(&self, user_id: &str) -> Option<SharedTask> {
        let session = self.inner.sessions.get(user_id)?;
        let current = lock_session(&session).current_task();
        current
    }

    /// Progress of the user's current task.
    pub fn status(&self, user_id: &str) -> Option<TaskProgress> {
        self.current_task(user_id).map(|t| lock_task(&t).progress())
    }

    /// Result of the user's most recently finished task.
    pub fn last_result(&self, user_id: &str) -> Option<ExecutionResult> {
        let session = self.inner.sessions.get(user_id)?;
        let result = lock_session(&session).last_result().cloned();
        result
    }

    /// Page of chat history counted back from the newest message.
    pub fn chat_history(&self, user_id: &str, offset: usize, limit: usize) -> ChatPage {
        let (total_messages, messages) = match self.inner.sessions.get(user_id) {
            Some(session) => {
                let s = lock_session(&session);
                (s.history().len(), s.history().page(offset, limit).to_vec())
            }
            None => (0, Vec::new()),
        };
        ChatPage {
            user_id: user_id.to_string(),
            total_messages,
            offset,
            limit,
            messages,
        }
    }

    pub fn file_summary(&self, task_id: &str) -> Option<ArtifactSummary> {
        self.inner.artifacts.summary(task_id)
    }

    /// Packages the task's artifacts and returns the archive path.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::TaskNotFound` if the task has no artifacts
    /// or belongs to another user
    pub async fn download_package(&self, task_id: &str, user_id: &str) -> Result<PathBuf> {
        let artifacts = Arc::clone(&self.inner.artifacts);
        let (task, user) = (task_id.to_string(), user_id.to_string());
        let packaged = task::spawn_blocking(move || artifacts.package(&task, &user))
            .await
            .map_err(OrchestratorError::join)??;
        packaged.ok_or_else(|| OrchestratorError::TaskNotFound {
            task_id: task_id.to_string(),
        })
    }

    /// Subscribes to the user's event stream, creating the session if needed.
    pub fn subscribe(&self, user_id: &str) -> (SubscriptionId, mpsc::UnboundedReceiver<Event>) {
        let session = self.inner.sessions.get_or_create(user_id);
        let events = Arc::clone(lock_session(&session).events());
        events.subscribe_channel()
    }

    /// Registers a synchronous listener on the user's event stream.
    pub fn subscribe_with<F>(&self, user_id: &str, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let session = self.inner.sessions.get_or_create(user_id);
        let events = Arc::clone(lock_session(&session).events());
        events.subscribe(listener)
    }

    pub fn unsubscribe(&self, user_id: &str, id: SubscriptionId) -> bool {
        let Some(session) = self.inner.sessions.get(user_id) else {
            return false;
        };
        let events = Arc::clone(lock_session(&session).events());
        events.unsubscribe(id)
    }

    /// Cancels the user's in-flight task.
    pub fn cancel(&self, user_id: &str) -> Result<bool> {
        let session = self.session(user_id)?;
        let cancelled = lock_session(&session).cancel();
        Ok(cancelled)
    }

    /// Removes the task's artifacts from disk and from the registry.
    pub async fn cleanup_task(&self, task_id: &str, user_id: &str) -> Result<()> {
        let artifacts = Arc::clone(&self.inner.artifacts);
        let (task, user) = (task_id.to_string(), user_id.to_string());
        task::spawn_blocking(move || artifacts.cleanup(&task, &user))
            .await
            .map_err(OrchestratorError::join)?
    }

    /// Drops sessions idle for at least `idle_after`.
    pub fn sweep(&self, idle_after: Duration) -> Vec<String> {
        self.inner.sessions.sweep(idle_after)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner.sessions.list()
    }

    pub async fn tools(&self) -> Result<Vec<ToolSpec>> {
        self.inner.gateway.catalog().await
    }

    pub async fn report_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let reporter = Arc::clone(&self.inner.reporter);
        task::spawn_blocking(move || reporter.history(limit))
            .await
            .map_err(OrchestratorError::join)?
    }

    /// Deletes stored reports and raw dumps older than `older_than`.
    pub async fn purge_results(&self, older_than: Duration) -> Result<usize> {
        let reporter = Arc::clone(&self.inner.reporter);
        task::spawn_blocking(move || reporter.purge(older_than))
            .await
            .map_err(OrchestratorError::join)?
    }
}

fn validate(user_id: &str, text: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(OrchestratorError::invalid_input("user_id").with_reason("must not be empty"));
    }
    path_segment("user_id", user_id)?;
    if text.trim().is_empty() {
        return Err(OrchestratorError::invalid_input("text").with_reason("must not be empty"));
    }
    Ok(())
}
