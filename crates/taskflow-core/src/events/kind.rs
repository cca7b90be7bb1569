use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type tag of a lifecycle notification.
///
/// Serialized as its snake_case string; unrecognized tags survive a round
/// trip through [`EventKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    TaskStart,
    StepStart,
    ToolCallStart,
    ToolCallComplete,
    StepProgress,
    StepComplete,
    TaskComplete,
    TaskAnalysisStart,
    TaskTypeDetected,
    ClarityCheckStart,
    ClarityScore,
    PlanGenerationStart,
    PlanStepGenerated,
    PlanGenerated,
    ResultCollectionStart,
    ReportGenerationStart,
    ReportSaved,
    FileRegistered,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::TaskStart => "task_start",
            EventKind::StepStart => "step_start",
            EventKind::ToolCallStart => "tool_call_start",
            EventKind::ToolCallComplete => "tool_call_complete",
            EventKind::StepProgress => "step_progress",
            EventKind::StepComplete => "step_complete",
            EventKind::TaskComplete => "task_complete",
            EventKind::TaskAnalysisStart => "task_analysis_start",
            EventKind::TaskTypeDetected => "task_type_detected",
            EventKind::ClarityCheckStart => "clarity_check_start",
            EventKind::ClarityScore => "clarity_score",
            EventKind::PlanGenerationStart => "plan_generation_start",
            EventKind::PlanStepGenerated => "plan_step_generated",
            EventKind::PlanGenerated => "plan_generated",
            EventKind::ResultCollectionStart => "result_collection_start",
            EventKind::ReportGenerationStart => "report_generation_start",
            EventKind::ReportSaved => "report_saved",
            EventKind::FileRegistered => "file_registered",
            EventKind::Other(name) => name,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "task_start" => EventKind::TaskStart,
            "step_start" => EventKind::StepStart,
            "tool_call_start" => EventKind::ToolCallStart,
            "tool_call_complete" => EventKind::ToolCallComplete,
            "step_progress" => EventKind::StepProgress,
            "step_complete" => EventKind::StepComplete,
            "task_complete" => EventKind::TaskComplete,
            "task_analysis_start" => EventKind::TaskAnalysisStart,
            "task_type_detected" => EventKind::TaskTypeDetected,
            "clarity_check_start" => EventKind::ClarityCheckStart,
            "clarity_score" => EventKind::ClarityScore,
            "plan_generation_start" => EventKind::PlanGenerationStart,
            "plan_step_generated" => EventKind::PlanStepGenerated,
            "plan_generated" => EventKind::PlanGenerated,
            "result_collection_start" => EventKind::ResultCollectionStart,
            "report_generation_start" => EventKind::ReportGenerationStart,
            "report_saved" => EventKind::ReportSaved,
            "file_registered" => EventKind::FileRegistered,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        EventKind::from(s.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped notification, serialized as `{type, data, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: Timestamp,
}

impl Event {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Timestamp::now(),
        }
    }

    /// String field of the payload, if present.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}
