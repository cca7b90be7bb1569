//! Core library for the TaskFlow task orchestration engine.
//!
//! A user's free-text request goes through a fixed pipeline:
//!
//! 1. **Intake** ([`intake`]): a planner turns the text into a [`Task`]
//!    with an ordered [`Plan`] of tool calls, or asks for clarification
//! 2. **Execution** ([`executor`]): steps run in order through the
//!    [`gateway`], stopping at the first failure
//! 3. **Artifacts** ([`artifacts`]): files mentioned by tool results are
//!    resolved, copied into a per-task directory and packaged as a zip
//! 4. **Reporting** ([`report`]): the outcome is saved as JSON or text
//!    reports plus a raw dump
//!
//! Progress is published on a per-user [`events::EventBus`], and
//! [`session`] keeps per-user chat history and the in-flight task.
//!
//! # Display Architecture
//!
//! Domain models implement [`std::fmt::Display`] producing markdown, and
//! the [`display`] wrappers cover lists and composite results. The CLI
//! renders the markdown in the terminal; the MCP server returns it as is.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use taskflow_core::gateway::{LocalTransport, ToolSpec};
//! use taskflow_core::OrchestratorBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = LocalTransport::new().with_tool(
//!     ToolSpec::new("generate_answer_tool", "Answers a question"),
//!     |args| Ok(json!({"answer": args.get("query").cloned()})),
//! );
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .with_data_dir(Some("/tmp/taskflow"))
//!     .with_transport(Arc::new(transport))
//!     .build()
//!     .await?;
//!
//! let outcome = orchestrator.run("alice", "what is the capital of France?").await?;
//! println!("{}", outcome.task);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod display;
pub mod error;
pub mod events;
pub mod executor;
pub mod gateway;
pub mod intake;
pub mod models;
pub mod orchestrator;
pub mod params;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use artifacts::{ArtifactRegistry, SearchPathPolicy};
pub use display::{ChatTranscript, HistoryEntries, RunSummary, ToolCatalog};
pub use error::{OrchestratorError, Result};
pub use events::{Event, EventBus, EventKind};
pub use gateway::{ToolGateway, ToolTransport};
pub use intake::{PlanRequest, PlanSource};
pub use models::{
    ArtifactSummary, ChatMessage, ExecutionResult, Plan, Step, StepStatus, Task, TaskProgress,
    TaskStatus,
};
pub use orchestrator::{ChatPage, Orchestrator, OrchestratorBuilder, RunOutcome};
pub use report::{ReportFormat, ResultReporter};
