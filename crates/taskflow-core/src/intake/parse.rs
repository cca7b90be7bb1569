//! Planner reply parsing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{OrchestratorError, Result};
use crate::models::{Plan, Step};

/// Tool used by the fallback plan.
pub const FALLBACK_TOOL: &str = "generate_answer_tool";

/// Clarity scores (0 to 10) below this need clarification when the planner
/// also asked questions.
pub const CLARITY_THRESHOLD: f64 = 6.0;

/// Structured planner output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlannerReply {
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default, alias = "complexity_level")]
    pub complexity: Option<String>,
    #[serde(default)]
    pub is_conversation: bool,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub clarification_questions: Vec<String>,
    #[serde(default)]
    pub clarity_score: Option<f64>,
    #[serde(default)]
    pub steps: Vec<PlannedStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedStep {
    #[serde(alias = "step_description")]
    pub description: String,
    #[serde(alias = "function_name")]
    pub tool_name: String,
    #[serde(default, alias = "args")]
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub is_final: bool,
}

impl PlannerReply {
    /// Single-step plan that answers the request directly.
    pub fn fallback(user_input: &str) -> Self {
        let mut arguments = Map::new();
        arguments.insert("query".to_string(), json!(user_input));
        Self {
            steps: vec![PlannedStep {
                description: format!("Handle user request: {user_input}"),
                tool_name: FALLBACK_TOOL.to_string(),
                arguments,
                is_final: true,
            }],
            ..Self::default()
        }
    }

    pub fn needs_clarification(&self) -> bool {
        !self.clarification_questions.is_empty()
            && self.clarity_score.map_or(true, |s| s < CLARITY_THRESHOLD)
    }

    pub fn to_plan(&self) -> Plan {
        Plan::new(
            self.steps
                .iter()
                .map(|s| {
                    Step::new(s.description.clone(), s.tool_name.clone(), s.arguments.clone())
                        .with_final(s.is_final)
                })
                .collect(),
        )
    }
}

/// Pulls the JSON document out of free-form planner text.
///
/// A ```json fence wins; otherwise the span from the first `{` to the last
/// `}` is taken.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        let end = body.find("```").unwrap_or(body.len());
        return Some(body[..end].trim());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses raw planner output into a reply.
pub fn parse_reply(text: &str) -> Result<PlannerReply> {
    let json = extract_json(text)
        .ok_or_else(|| OrchestratorError::plan_parse("no JSON object in planner output"))?;
    serde_json::from_str(json)
        .map_err(|e| OrchestratorError::plan_parse(format!("malformed planner JSON: {e}")))
}
