//! Plan intake: turns a raw request into a [`Task`].
//!
//! The natural-language planner lives outside this crate behind
//! [`PlanSource`]. Intake asks it for a reply, parses the JSON it returns,
//! and builds one of three task shapes:
//!
//! - a conversation task carrying a precomputed reply,
//! - a clarification task with questions and an empty plan,
//! - a regular task whose plan came from the planner.
//!
//! Planner failures and malformed replies never surface to the caller; the
//! request is answered with the single-step fallback plan instead.

mod parse;
mod source;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::events::{EventBus, EventKind};
use crate::gateway::ToolGateway;
use crate::models::Task;

pub use parse::{
    extract_json, parse_reply, PlannedStep, PlannerReply, CLARITY_THRESHOLD, FALLBACK_TOOL,
};
pub use source::{CommandPlanSource, FallbackPlanSource, FixedPlanSource};

/// What a planner receives for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRequest {
    pub user_input: String,
    /// Catalog summary, one tool per entry
    pub tools: String,
}

/// Produces raw planner output for a request.
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn plan(&self, request: &PlanRequest) -> anyhow::Result<String>;
}

pub struct PlanIntake {
    source: Arc<dyn PlanSource>,
    gateway: Option<Arc<ToolGateway>>,
}

impl PlanIntake {
    pub fn new(source: Arc<dyn PlanSource>) -> Self {
        Self {
            source,
            gateway: None,
        }
    }

    /// The catalog is sent to the planner and used to flag unknown tools.
    pub fn with_gateway(mut self, gateway: Arc<ToolGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Analyzes a request and returns the task to execute.
    pub async fn analyze(&self, user_input: &str, events: &EventBus) -> Task {
        let tools = match &self.gateway {
            Some(gateway) => gateway.describe_for_planning().await.unwrap_or_else(|e| {
                log::warn!("Tool catalog unavailable for planning: {e}");
                String::new()
            }),
            None => String::new(),
        };
        let request = PlanRequest {
            user_input: user_input.to_string(),
            tools,
        };

        let reply = match self.source.plan(&request).await {
            Ok(raw) => parse_reply(&raw).unwrap_or_else(|e| {
                log::warn!("Falling back to default plan: {e}");
                PlannerReply::fallback(user_input)
            }),
            Err(e) => {
                log::warn!("Planner failed, falling back to default plan: {e:#}");
                PlannerReply::fallback(user_input)
            }
        };

        if reply.is_conversation {
            log::info!("Request answered as conversation");
            return Task::conversation(user_input, reply.reply.unwrap_or_default());
        }

        events.publish(
            EventKind::TaskAnalysisStart,
            json!({"user_input": user_input, "message": "Analyzing request"}),
        );
        events.publish(
            EventKind::ClarityCheckStart,
            json!({"message": "Checking request clarity"}),
        );
        if let Some(score) = reply.clarity_score {
            events.publish(
                EventKind::ClarityScore,
                json!({
                    "score": score / 10.0,
                    "needs_clarification": reply.needs_clarification(),
                    "questions": reply.clarification_questions,
                    "message": format!("Clarity {score}/10"),
                }),
            );
        }

        if reply.needs_clarification() {
            log::info!(
                "Request needs clarification ({} questions)",
                reply.clarification_questions.len()
            );
            return Task::clarification(user_input, reply.clarification_questions);
        }

        let task_type = reply
            .task_type
            .clone()
            .unwrap_or_else(|| "general".to_string());
        events.publish(
            EventKind::TaskTypeDetected,
            json!({"task_type": task_type, "message": format!("Task type: {task_type}")}),
        );
        events.publish(
            EventKind::PlanGenerationStart,
            json!({"message": "Generating plan"}),
        );

        let plan = reply.to_plan();
        let total = plan.len();
        for (index, step) in plan.steps.iter().enumerate() {
            events.publish(
                EventKind::PlanStepGenerated,
                json!({
                    "index": index,
                    "total": total,
                    "description": step.description,
                    "tool_name": step.tool_name,
                    "message": format!("Step {}/{total}: {}", index + 1, step.description),
                }),
            );
        }
        self.warn_unknown_tools(&reply).await;

        let mut task = Task::new(user_input, plan).with_task_type(task_type);
        if let Some(complexity) = reply.complexity {
            task = task.with_complexity(complexity);
        }

        events.publish(
            EventKind::PlanGenerated,
            json!({
                "task_id": task.task_id,
                "total_steps": total,
                "task_type": task.task_type,
                "message": format!("Plan ready with {total} steps"),
            }),
        );
        log::info!("Planned task {} with {total} steps", task.task_id);
        task
    }

    async fn warn_unknown_tools(&self, reply: &PlannerReply) {
        let Some(gateway) = &self.gateway else {
            return;
        };
        for step in &reply.steps {
            if let Ok(false) = gateway.is_available(&step.tool_name).await {
                log::warn!("Plan references unknown tool {}", step.tool_name);
            }
        }
    }
}
