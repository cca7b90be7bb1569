//! Execution result snapshot produced once a task finishes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Step, StepStatus};

/// Outcome of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepOutcome {
    pub step_id: String,
    pub description: String,
    pub tool_name: String,
    /// Raw tool result, or `{"error": ...}` for failed steps
    pub result: Value,
    pub status: StepStatus,
}

impl From<&Step> for StepOutcome {
    fn from(step: &Step) -> Self {
        Self {
            step_id: step.step_id.clone(),
            description: step.description.clone(),
            tool_name: step.tool_name.clone(),
            result: step.result.clone().unwrap_or(Value::Null),
            status: step.status,
        }
    }
}

/// Immutable snapshot of a finished task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub task_id: String,
    /// True iff no step failed and the task was not aborted
    pub success: bool,
    /// Outcomes for every step that ran, in plan order
    pub results: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Elapsed wall time in seconds
    pub execution_time: f64,
    /// Canonical paths of artifacts discovered during execution
    #[serde(default)]
    pub files_generated: Vec<PathBuf>,
}

impl ExecutionResult {
    pub fn completed_steps(&self) -> usize {
        self.count(StepStatus::Completed)
    }

    pub fn failed_steps(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}
