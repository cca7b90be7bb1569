//! Task model: a plan together with the request that produced it.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Plan, Step, TaskStatus};

/// Tool name of the synthetic step carried by conversation tasks.
pub const CHAT_RESPONSE_TOOL: &str = "chat_response";

/// Wraps a plan with the user request and classification tags.
///
/// A task owns its plan exclusively; plans are never shared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier for the task
    pub task_id: String,

    /// Original, unmodified user request
    pub user_input: String,

    /// Opaque classification tag from the planner
    pub task_type: String,

    /// Opaque complexity tag (simple/medium/complex by default)
    pub complexity: String,

    /// Current lifecycle status
    #[serde(default)]
    pub status: TaskStatus,

    /// Questions to ask the user before anything can run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clarification_questions: Vec<String>,

    /// Chit-chat that only echoes a precomputed reply
    #[serde(default)]
    pub is_conversation: bool,

    /// Task this one refines, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,

    /// Artifact paths discovered while executing
    #[serde(default)]
    pub generated_files: Vec<String>,

    /// The execution plan
    pub plan: Plan,

    /// Timestamp when the task was created (UTC)
    pub created_at: Timestamp,
}

impl Task {
    /// Creates a pending task for a regular plan.
    pub fn new(user_input: impl Into<String>, plan: Plan) -> Self {
        let complexity = complexity_for(plan.len()).to_string();
        Self {
            task_id: Uuid::new_v4().to_string(),
            user_input: user_input.into(),
            task_type: "general".to_string(),
            complexity,
            status: TaskStatus::Pending,
            clarification_questions: Vec::new(),
            is_conversation: false,
            parent_task_id: None,
            generated_files: Vec::new(),
            plan,
            created_at: Timestamp::now(),
        }
    }

    /// Creates a conversation task whose single step echoes `reply`.
    pub fn conversation(user_input: impl Into<String>, reply: impl Into<String>) -> Self {
        let mut arguments = Map::new();
        arguments.insert("response".to_string(), Value::String(reply.into()));
        let step = Step::new("Reply directly", CHAT_RESPONSE_TOOL, arguments).with_final(true);

        let mut task = Self::new(user_input, Plan::new(vec![step]));
        task.task_type = "conversation".to_string();
        task.complexity = "simple".to_string();
        task.is_conversation = true;
        task
    }

    /// Creates a task that cannot run until the user answers `questions`.
    pub fn clarification(user_input: impl Into<String>, questions: Vec<String>) -> Self {
        let mut task = Self::new(user_input, Plan::empty());
        task.task_type = "clarification".to_string();
        task.complexity = "unknown".to_string();
        task.clarification_questions = questions;
        task
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    pub fn with_complexity(mut self, complexity: impl Into<String>) -> Self {
        self.complexity = complexity.into();
        self
    }

    pub fn requires_clarification(&self) -> bool {
        !self.clarification_questions.is_empty()
    }

    /// Snapshot of execution progress.
    pub fn progress(&self) -> TaskProgress {
        let total = self.plan.len();
        let completed = self.plan.finished_steps();
        TaskProgress {
            task_id: self.task_id.clone(),
            status: self.status,
            task_type: self.task_type.clone(),
            complexity: self.complexity.clone(),
            completed,
            total,
            percentage: if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            current_step: self.plan.running_step().map(|s| s.description.clone()),
        }
    }
}

/// Complexity tag derived from the number of steps.
pub fn complexity_for(step_count: usize) -> &'static str {
    match step_count {
        0 | 1 => "simple",
        2 | 3 => "medium",
        _ => "complex",
    }
}

/// Progress of a task as reported to presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskProgress {
    pub task_id: String,
    pub status: TaskStatus,
    pub task_type: String,
    pub complexity: String,
    /// Steps in a terminal state
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
    /// Description of the running step
    pub current_step: Option<String>,
}
