//! Plan model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Step, StepStatus};

/// An ordered list of steps. Steps run strictly in sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Unique identifier for the plan
    pub plan_id: String,

    /// Timestamp when the plan was built (UTC)
    pub created_at: Timestamp,

    /// Steps in execution order
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// Creates a plan from steps in execution order.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            plan_id: Uuid::new_v4().to_string(),
            created_at: Timestamp::now(),
            steps,
        }
    }

    /// Creates a plan with no steps.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps that have reached a terminal status.
    pub fn finished_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_terminal()).count()
    }

    /// Whether any step has failed.
    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    /// The step currently running, if any.
    pub fn running_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.status == StepStatus::Running)
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}
