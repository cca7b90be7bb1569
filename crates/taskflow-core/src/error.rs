//! Error types for the orchestration pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::StepStatus;

/// Comprehensive error type for all orchestration operations.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Planner output could not be turned into a plan
    #[error("Plan parse error: {message}")]
    PlanParse { message: String },
    /// Requested tool is not part of the loaded catalog
    #[error("Tool '{name}' is not available")]
    ToolNotAvailable { name: String },
    /// The transport or the remote tool reported a failure
    #[error("Tool '{name}' invocation failed: {message}")]
    ToolInvocation { name: String, message: String },
    /// A file referenced by a step result does not exist
    #[error("Artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },
    /// Catch-all raised inside the executor loop
    #[error("Task execution error: {message}")]
    TaskExecution { message: String },
    /// A step was asked to move between two states that are not connected
    #[error("Step {step_id} cannot move from {from} to {to}")]
    InvalidTransition {
        step_id: String,
        from: StepStatus,
        to: StepStatus,
    },
    /// No session exists for the given user
    #[error("No session for user '{user_id}'")]
    SessionNotFound { user_id: String },
    /// No task with the given ID is known
    #[error("Task with ID {task_id} not found")]
    TaskNotFound { task_id: String },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Zip archive errors
    #[error("Archive error: {source}")]
    Archive {
        #[from]
        source: zip::result::ZipError,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
}

/// Builder for tool invocation errors.
pub struct ToolInvocationBuilder {
    name: String,
}

impl ToolInvocationBuilder {
    /// Create a new builder for the named tool.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Build the error with the underlying failure.
    pub fn with_message(self, message: impl fmt::Display) -> OrchestratorError {
        OrchestratorError::ToolInvocation {
            name: self.name,
            message: message.to_string(),
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> OrchestratorError {
        OrchestratorError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl OrchestratorError {
    /// Creates a builder for tool invocation errors.
    pub fn tool_invocation(name: impl Into<String>) -> ToolInvocationBuilder {
        ToolInvocationBuilder::new(name)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Creates a plan parse error.
    pub fn plan_parse(message: impl Into<String>) -> Self {
        Self::PlanParse {
            message: message.into(),
        }
    }

    /// Creates a task execution error.
    pub fn task_execution(message: impl Into<String>) -> Self {
        Self::TaskExecution {
            message: message.into(),
        }
    }

    /// Creates a file system error for the given path.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Wraps a `spawn_blocking` join failure.
    pub fn join(error: tokio::task::JoinError) -> Self {
        Self::Configuration {
            message: format!("Task join error: {error}"),
        }
    }
}

/// Extension trait for Result to provide concise error mapping with
/// anyhow-style context.
pub trait ResultExt<T, E> {
    /// Add context to any error type, converting to OrchestratorError.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

/// Specialized extension trait for filesystem Results.
pub trait FsResultExt<T> {
    /// Attach the path the operation was working on.
    fn fs_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| OrchestratorError::Configuration {
            message: format!("{}: {}", context, e),
        })
    }
}

impl<T> FsResultExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| OrchestratorError::file_system(path, e))
    }
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
