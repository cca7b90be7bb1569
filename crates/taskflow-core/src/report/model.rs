use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{StepOutcome, StepStatus};

/// Version tag written into every report.
pub const REPORT_VERSION: &str = "1.0";

/// Coarse classification of a raw step result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Error,
    FileGeneration,
    WebContent,
    StructuredData,
    TextContent,
    ListData,
    Unknown,
}

impl ResultType {
    pub fn classify(result: &Value) -> Self {
        match result {
            Value::Object(map) if map.contains_key("error") => ResultType::Error,
            Value::Object(map) if map.contains_key("file_path") => ResultType::FileGeneration,
            Value::Object(map) if map.contains_key("url") || map.contains_key("urls") => {
                ResultType::WebContent
            }
            Value::Object(_) => ResultType::StructuredData,
            Value::String(_) => ResultType::TextContent,
            Value::Array(_) => ResultType::ListData,
            _ => ResultType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskInfo {
    pub task_id: String,
    pub user_input: String,
    pub task_type: String,
    pub complexity_level: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub success: bool,
    pub execution_time: f64,
    pub total_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub files_generated: Vec<PathBuf>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepAnalysis {
    /// Seconds between start and end, when both were recorded
    pub execution_duration: Option<f64>,
    pub result_type: ResultType,
    /// 1.0 for completed steps, 0.0 otherwise
    pub success_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDetail {
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub analysis: StepAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    pub generated_at: Timestamp,
    pub report_version: String,
}

/// Final structured report of one task run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub task_info: TaskInfo,
    pub execution_summary: ExecutionSummary,
    pub step_details: Vec<StepDetail>,
    pub metadata: ReportMetadata,
}

impl Report {
    /// Plain-text rendering saved alongside the JSON form.
    pub fn to_text(&self) -> String {
        let summary = &self.execution_summary;
        let mut out = String::new();
        let _ = writeln!(out, "Task Execution Report");
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(out, "Task ID: {}", self.task_info.task_id);
        let _ = writeln!(out, "User input: {}", self.task_info.user_input);
        let _ = writeln!(
            out,
            "Result: {}",
            if summary.success { "success" } else { "failure" }
        );
        let _ = writeln!(out, "Execution time: {:.2}s", summary.execution_time);
        let _ = writeln!(out, "Files generated: {}", summary.files_generated.len());
        if let Some(error) = &summary.error_message {
            let _ = writeln!(out, "Error: {error}");
        }

        if !self.step_details.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Steps:");
            for (i, detail) in self.step_details.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {} [{}] {}",
                    i + 1,
                    detail.outcome.description,
                    detail.outcome.tool_name,
                    detail.outcome.status.with_icon()
                );
            }
        }
        out
    }

    pub fn completed_steps(&self) -> usize {
        self.step_details
            .iter()
            .filter(|d| d.outcome.status == StepStatus::Completed)
            .count()
    }
}

/// Output format accepted by [`super::ResultReporter::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Text,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Text => "text",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "text" | "txt" => Ok(ReportFormat::Text),
            _ => Err(format!("Invalid report format: {s}")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of report history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub task_id: String,
    /// User input, cut to 100 characters
    pub user_input: String,
    pub success: bool,
    pub execution_time: f64,
    pub files_generated: usize,
    pub generated_at: Timestamp,
    pub report_file: PathBuf,
}
