//! MCP tool handlers implementation

use log::{debug, error, info};
use rmcp::{
    handler::server::tool::Parameters,
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::Deserialize;
use taskflow_core::{
    display::{ChatTranscript, HistoryEntries, RunSummary, ToolCatalog},
    params as core, Orchestrator, RunOutcome,
};

use super::errors::to_mcp_error;

/// Generic MCP wrapper for core parameter types
///
/// Deserializes transparently into the wrapped type and forwards its JSON
/// schema, so the core params stay free of MCP-specific code.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct McpParams<T>(T)
where
    T: JsonSchema;

impl<T> JsonSchema for McpParams<T>
where
    T: JsonSchema,
{
    fn schema_name() -> std::borrow::Cow<'static, str> {
        T::schema_name()
    }

    fn json_schema(g: &mut schemars::SchemaGenerator) -> schemars::Schema {
        T::json_schema(g)
    }
}

impl<T> AsRef<T> for McpParams<T>
where
    T: JsonSchema,
{
    fn as_ref(&self) -> &T {
        &self.0
    }
}

pub type SubmitTask = McpParams<core::SubmitTask>;
pub type UserRef = McpParams<core::UserRef>;
pub type TaskRef = McpParams<core::TaskRef>;
pub type ChatHistoryQuery = McpParams<core::ChatHistoryQuery>;
pub type ReportHistory = McpParams<core::ReportHistory>;

pub type McpResult = Result<CallToolResult, McpError>;

fn text(body: impl Into<String>) -> McpResult {
    Ok(CallToolResult::success(vec![Content::text(body.into())]))
}

/// Handler implementations for the MCP server
pub struct McpHandlers {
    orchestrator: Orchestrator,
}

impl McpHandlers {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn submit_task(&self, Parameters(params): Parameters<SubmitTask>) -> McpResult {
        debug!("submit_task: {:?}", params);
        let params = params.as_ref();

        let handle = self
            .orchestrator
            .submit(&params.user_id, &params.text)
            .map_err(|e| to_mcp_error("Failed to submit task", &e))?;

        let user_id = params.user_id.clone();
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(outcome)) => info!(
                    "Task {} for {user_id} finished ({})",
                    outcome.task.task_id, outcome.task.status
                ),
                Ok(Err(e)) => error!("Task for {user_id} failed: {e}"),
                Err(e) => error!("Task for {user_id} did not complete: {e}"),
            }
        });

        text(format!(
            "Task submitted for user `{}`. Use `task_status` to follow its progress.",
            params.user_id
        ))
    }

    pub async fn run_task(&self, Parameters(params): Parameters<SubmitTask>) -> McpResult {
        debug!("run_task: {:?}", params);
        let params = params.as_ref();

        let outcome = self
            .orchestrator
            .run(&params.user_id, &params.text)
            .await
            .map_err(|e| to_mcp_error("Failed to run task", &e))?;

        text(self.describe_outcome(&outcome))
    }

    fn describe_outcome(&self, outcome: &RunOutcome) -> String {
        let Some(result) = &outcome.result else {
            return outcome.task.to_string();
        };
        if outcome.task.is_conversation {
            return result
                .results
                .first()
                .and_then(|r| r.result.get("response"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
        }
        let files = self.orchestrator.file_summary(&result.task_id);
        RunSummary::new(result)
            .with_files(files.as_ref())
            .with_reports(&outcome.reports)
            .to_string()
    }

    pub async fn task_status(&self, Parameters(params): Parameters<UserRef>) -> McpResult {
        debug!("task_status: {:?}", params);
        let user_id = &params.as_ref().user_id;

        if let Some(progress) = self.orchestrator.status(user_id) {
            if !progress.status.is_finished() {
                return text(progress.to_string());
            }
        }
        match self.orchestrator.last_result(user_id) {
            Some(result) => {
                let files = self.orchestrator.file_summary(&result.task_id);
                text(RunSummary::new(&result).with_files(files.as_ref()).to_string())
            }
            None => text(format!("No tasks for user `{user_id}`.")),
        }
    }

    pub async fn chat_history(
        &self,
        Parameters(params): Parameters<ChatHistoryQuery>,
    ) -> McpResult {
        debug!("chat_history: {:?}", params);
        let query = params.as_ref();

        let page = self
            .orchestrator
            .chat_history(&query.user_id, query.offset, query.limit);
        text(format!(
            "# Chat history for {} ({} of {} messages)\n\n{}",
            page.user_id,
            page.messages.len(),
            page.total_messages,
            ChatTranscript(page.messages)
        ))
    }

    pub async fn task_files(&self, Parameters(params): Parameters<TaskRef>) -> McpResult {
        debug!("task_files: {:?}", params);
        let task_id = &params.as_ref().task_id;

        match self.orchestrator.file_summary(task_id) {
            Some(summary) => text(summary.to_string()),
            None => text(format!("No files registered for task {task_id}.")),
        }
    }

    pub async fn download_package(&self, Parameters(params): Parameters<TaskRef>) -> McpResult {
        debug!("download_package: {:?}", params);
        let task = params.as_ref();

        let path = self
            .orchestrator
            .download_package(&task.task_id, &task.user_id)
            .await
            .map_err(|e| to_mcp_error("Failed to package task files", &e))?;
        text(format!("Download package ready: {}", path.display()))
    }

    pub async fn cancel_task(&self, Parameters(params): Parameters<UserRef>) -> McpResult {
        debug!("cancel_task: {:?}", params);
        let user_id = &params.as_ref().user_id;

        let cancelled = self
            .orchestrator
            .cancel(user_id)
            .map_err(|e| to_mcp_error("Failed to cancel task", &e))?;
        if cancelled {
            text(format!("Cancelled the running task for `{user_id}`."))
        } else {
            text(format!("No task in progress for `{user_id}`."))
        }
    }

    pub async fn list_tools(&self) -> McpResult {
        let tools = self
            .orchestrator
            .tools()
            .await
            .map_err(|e| to_mcp_error("Failed to load tool catalog", &e))?;
        text(ToolCatalog(tools).to_string())
    }

    pub async fn report_history(
        &self,
        Parameters(params): Parameters<ReportHistory>,
    ) -> McpResult {
        debug!("report_history: {:?}", params);

        let entries = self
            .orchestrator
            .report_history(params.as_ref().limit)
            .await
            .map_err(|e| to_mcp_error("Failed to read report history", &e))?;
        text(HistoryEntries(entries).to_string())
    }
}
