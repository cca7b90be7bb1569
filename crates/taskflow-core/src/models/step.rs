//! Step model definition and its state machine.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::StepStatus;
use crate::error::{OrchestratorError, Result};

/// Represents one tool invocation within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Unique identifier for the step
    pub step_id: String,

    /// Human readable summary of what the step does
    pub description: String,

    /// Name of the tool in the gateway catalog
    pub tool_name: String,

    /// Arguments passed verbatim to the tool
    #[serde(default)]
    pub arguments: Map<String, Value>,

    /// A failure of this step aborts the rest of the plan
    #[serde(default)]
    pub is_final: bool,

    /// Current status of the step
    #[serde(default)]
    pub status: StepStatus,

    /// Raw tool result, present once the step has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Failure message, present iff the step failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set on the transition into Running (UTC)
    pub start_time: Option<Timestamp>,

    /// Set on the transition out of Running (UTC)
    pub end_time: Option<Timestamp>,
}

impl Step {
    /// Creates a pending step with a fresh ID.
    pub fn new(
        description: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            step_id: Uuid::new_v4().to_string(),
            description: description.into(),
            tool_name: tool_name.into(),
            arguments,
            is_final: false,
            status: StepStatus::Pending,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Marks whether a failure of this step halts the plan.
    pub fn with_final(mut self, is_final: bool) -> Self {
        self.is_final = is_final;
        self
    }

    /// Pending → Running.
    pub fn start(&mut self) -> Result<()> {
        self.transition(StepStatus::Pending, StepStatus::Running)?;
        self.start_time = Some(Timestamp::now());
        Ok(())
    }

    /// Running → Completed, recording the tool result.
    pub fn complete(&mut self, result: Value) -> Result<()> {
        self.transition(StepStatus::Running, StepStatus::Completed)?;
        self.result = Some(result);
        self.stamp_end();
        Ok(())
    }

    /// Running → Failed. The stored result becomes `{"error": message}`.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(StepStatus::Running, StepStatus::Failed)?;
        let message = message.into();
        self.result = Some(json!({ "error": message }));
        self.error = Some(message);
        self.stamp_end();
        Ok(())
    }

    /// Pending → Skipped, used when the owning task is cancelled.
    pub fn skip(&mut self) -> Result<()> {
        self.transition(StepStatus::Pending, StepStatus::Skipped)
    }

    /// Wall time spent running, in seconds.
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start).as_secs_f64()),
            _ => None,
        }
    }

    fn transition(&mut self, from: StepStatus, to: StepStatus) -> Result<()> {
        if self.status != from {
            return Err(OrchestratorError::InvalidTransition {
                step_id: self.step_id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    // Wall clock can step backwards; never record an end before the start.
    fn stamp_end(&mut self) {
        let now = Timestamp::now();
        self.end_time = Some(match self.start_time {
            Some(start) if start > now => start,
            _ => now,
        });
    }
}
