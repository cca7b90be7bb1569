//! Data models for tasks, plans, steps and artifacts.
//!
//! These types are plain data. The state machine for steps lives on
//! [`Step`] itself; everything else is mutated only by the executor that owns
//! the task. Markdown formatting for presentation layers is in
//! [`crate::display`].
//!
//! # Examples
//!
//! ```rust
//! use serde_json::{json, Map};
//! use taskflow_core::models::{Plan, Step, StepStatus, Task};
//!
//! let mut args = Map::new();
//! args.insert("text".to_string(), json!("hi"));
//! let step = Step::new("Echo the greeting", "echo_tool", args).with_final(true);
//!
//! let task = Task::new("say hi", Plan::new(vec![step]));
//! assert_eq!(task.complexity, "simple");
//! assert_eq!(task.plan.steps[0].status, StepStatus::Pending);
//! ```

pub mod artifact;
pub mod chat;
pub mod execution;
pub mod plan;
pub mod status;
pub mod step;
pub mod task;

#[cfg(test)]
mod tests;

pub use artifact::{ArtifactEntry, ArtifactRecord, ArtifactSummary, TaskFilesMetadata};
pub use chat::{ChatMessage, MessageKind, Sender};
pub use execution::{ExecutionResult, StepOutcome};
pub use plan::Plan;
pub use status::{StepStatus, TaskStatus};
pub use step::Step;
pub use task::{complexity_for, Task, TaskProgress, CHAT_RESPONSE_TOOL};
