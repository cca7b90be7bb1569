//! MCP server exposing the TaskFlow session API
//!
//! Each tool maps onto one orchestrator operation. Tasks are keyed by
//! `user_id`, so several assistants can share one server without seeing each
//! other's sessions.

use std::future::Future;

use anyhow::Result;
use log::{debug, error, info};
use rmcp::{
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use taskflow_core::Orchestrator;
use tokio::signal::unix::{signal, SignalKind};

pub mod errors;
pub mod handlers;

pub use handlers::{ChatHistoryQuery, McpResult, ReportHistory, SubmitTask, TaskRef, UserRef};

/// MCP server for TaskFlow
#[derive(Clone)]
pub struct TaskFlowMcpServer {
    orchestrator: Orchestrator,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TaskFlowMcpServer {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }

    fn handlers(&self) -> handlers::McpHandlers {
        handlers::McpHandlers::new(self.orchestrator.clone())
    }

    #[tool(
        name = "submit_task",
        description = "Start planning and executing a free-form request for a user in the background. Any task the user still has running is cancelled first. Returns immediately; poll task_status for progress and the final result."
    )]
    async fn submit_task(&self, params: Parameters<SubmitTask>) -> McpResult {
        self.handlers().submit_task(params).await
    }

    #[tool(
        name = "run_task",
        description = "Plan and execute a request for a user and wait for it to finish. Returns the step outcomes, generated files and saved reports, the reply for conversational requests, or clarification questions when the request is ambiguous."
    )]
    async fn run_task(&self, params: Parameters<SubmitTask>) -> McpResult {
        self.handlers().run_task(params).await
    }

    #[tool(
        name = "task_status",
        description = "Show progress of the user's current task (completed steps, percentage, running step), or the summary of the last finished task."
    )]
    async fn task_status(&self, params: Parameters<UserRef>) -> McpResult {
        self.handlers().task_status(params).await
    }

    #[tool(
        name = "chat_history",
        description = "Page through a user's chat history. offset skips that many of the newest messages and limit caps the page size; messages are returned oldest first."
    )]
    async fn chat_history(&self, params: Parameters<ChatHistoryQuery>) -> McpResult {
        self.handlers().chat_history(params).await
    }

    #[tool(
        name = "task_files",
        description = "List the files registered for a task with their type, size and description."
    )]
    async fn task_files(&self, params: Parameters<TaskRef>) -> McpResult {
        self.handlers().task_files(params).await
    }

    #[tool(
        name = "download_package",
        description = "Package all files of a task, including its reports, into a zip archive and return the archive path."
    )]
    async fn download_package(&self, params: Parameters<TaskRef>) -> McpResult {
        self.handlers().download_package(params).await
    }

    #[tool(
        name = "cancel_task",
        description = "Cancel the user's running task. Remaining steps are skipped once the current step returns."
    )]
    async fn cancel_task(&self, params: Parameters<UserRef>) -> McpResult {
        self.handlers().cancel_task(params).await
    }

    #[tool(
        name = "list_tools",
        description = "List the tools available to plans, as advertised by the tool server."
    )]
    async fn list_tools(&self) -> McpResult {
        self.handlers().list_tools().await
    }

    #[tool(
        name = "report_history",
        description = "List saved task reports, newest first, with the request, outcome, execution time and report file."
    )]
    async fn report_history(&self, params: Parameters<ReportHistory>) -> McpResult {
        self.handlers().report_history(params).await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for TaskFlowMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "taskflow".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(r#"TaskFlow turns a plain-language request into a plan of tool calls, runs it step by step, collects the files the tools produce and saves a report.

## Workflow
1. Start a request with `submit_task` (background) or `run_task` (waits for the result)
2. Follow progress with `task_status`
3. Inspect generated files with `task_files` and fetch them as a zip with `download_package`
4. Stop a runaway task with `cancel_task`

## Sessions
Every call takes a `user_id` (default "default"). Each user has an independent chat history, event stream and at most one running task; submitting a new task cancels the previous one.

## Other tools
- `chat_history`: earlier requests and replies for a user
- `list_tools`: tools plans may use
- `report_history`: saved reports across all users"#.to_string()),
        }
    }
}

/// Run the MCP server with stdio transport
pub async fn run_stdio_server(server: TaskFlowMcpServer) -> Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    info!("Starting TaskFlow MCP server on stdio");
    debug!(
        "Server created with {} tools",
        server.tool_router.list_all().len()
    );

    let service = server.serve(stdio()).await.inspect_err(|e| {
        error!("serving error: {e:?}");
    })?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = service.waiting() => {
            match result {
                Ok(_) => info!("MCP server stopped normally"),
                Err(e) => error!("MCP server error: {e:?}"),
            }
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    info!("MCP server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use taskflow_core::OrchestratorBuilder;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_server_registers_session_tools() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator = OrchestratorBuilder::new()
            .with_data_dir(Some(temp_dir.path()))
            .build()
            .await
            .unwrap();
        let server = TaskFlowMcpServer::new(orchestrator);

        let names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        for expected in [
            "submit_task",
            "run_task",
            "task_status",
            "chat_history",
            "task_files",
            "download_package",
            "cancel_task",
            "list_tools",
            "report_history",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert_eq!(server.get_info().server_info.name, "taskflow");
    }
}
