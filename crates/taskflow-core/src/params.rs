//! Parameter structures shared by the presentation layers.
//!
//! These types carry no interface-specific derives. The CLI wraps them in
//! clap argument structs and the MCP server in a transparent serde wrapper;
//! with the `schema` feature enabled they also derive `JsonSchema` so the
//! MCP server can advertise input schemas.
//!
//! ```text
//! CLI Args (clap) ──┐
//!                   ├──▶ Core Params ──▶ Orchestrator
//! MCP Params (serde)┘
//! ```

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::artifacts::DEFAULT_USER;

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_history_limit() -> usize {
    10
}

/// A request to plan and execute free text for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct SubmitTask {
    /// User the task belongs to
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Free-form request to plan and execute
    pub text: String,
}

/// Identifies a user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct UserRef {
    #[serde(default = "default_user")]
    pub user_id: String,
}

impl Default for UserRef {
    fn default() -> Self {
        Self {
            user_id: default_user(),
        }
    }
}

/// Identifies a task within a user's artifact space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct TaskRef {
    pub task_id: String,
    /// Owner of the task's artifact directory
    #[serde(default = "default_user")]
    pub user_id: String,
}

/// One page of chat history, counted back from the newest message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ChatHistoryQuery {
    #[serde(default = "default_user")]
    pub user_id: String,
    /// Number of newest messages to skip
    #[serde(default)]
    pub offset: usize,
    /// Maximum number of messages to return
    #[serde(default = "default_page_size")]
    pub limit: usize,
}

/// Saved report history lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ReportHistory {
    /// Maximum number of entries, newest first
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

impl Default for ReportHistory {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

/// Deletes stored results older than the given age.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct PurgeResults {
    /// Age in days; files modified before that are removed
    pub days: u64,
}

impl PurgeResults {
    pub fn older_than(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.days.saturating_mul(24 * 60 * 60))
    }
}
