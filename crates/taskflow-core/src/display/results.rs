use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::models::{ArtifactSummary, ExecutionResult, StepStatus};
use crate::report::ReportFormat;

/// Markdown summary of a finished run.
pub struct RunSummary<'a> {
    pub result: &'a ExecutionResult,
    pub files: Option<&'a ArtifactSummary>,
    pub reports: Option<&'a BTreeMap<ReportFormat, PathBuf>>,
}

impl<'a> RunSummary<'a> {
    pub fn new(result: &'a ExecutionResult) -> Self {
        Self {
            result,
            files: None,
            reports: None,
        }
    }

    pub fn with_files(mut self, files: Option<&'a ArtifactSummary>) -> Self {
        self.files = files;
        self
    }

    pub fn with_reports(mut self, reports: &'a BTreeMap<ReportFormat, PathBuf>) -> Self {
        self.reports = Some(reports);
        self
    }
}

impl fmt::Display for RunSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;
        let headline = if result.success {
            "✓ Task completed"
        } else {
            "✗ Task failed"
        };
        writeln!(f, "# {headline}")?;
        writeln!(f)?;
        writeln!(f, "- Task: {}", result.task_id)?;
        writeln!(f, "- Time: {:.2}s", result.execution_time)?;
        writeln!(
            f,
            "- Steps: {} completed, {} failed",
            result.completed_steps(),
            result.failed_steps()
        )?;
        if let Some(error) = &result.error_message {
            writeln!(f, "- Error: {error}")?;
        }

        if !result.results.is_empty() {
            writeln!(f, "\n## Steps")?;
            writeln!(f)?;
            for (i, outcome) in result.results.iter().enumerate() {
                writeln!(
                    f,
                    "{}. {} `{}` ({})",
                    i + 1,
                    outcome.description,
                    outcome.tool_name,
                    outcome.status.with_icon()
                )?;
                if outcome.status == StepStatus::Failed {
                    if let Some(error) = outcome.result.get("error").and_then(|e| e.as_str()) {
                        writeln!(f, "   - {error}")?;
                    }
                }
            }
        }

        match self.files {
            Some(summary) if summary.file_count > 0 => {
                writeln!(f)?;
                write!(f, "{summary}")?;
            }
            _ if !result.files_generated.is_empty() => {
                writeln!(f, "\n## Files")?;
                writeln!(f)?;
                for path in &result.files_generated {
                    writeln!(f, "- {}", path.display())?;
                }
            }
            _ => {}
        }

        if let Some(reports) = self.reports.filter(|r| !r.is_empty()) {
            writeln!(f, "\n## Reports")?;
            writeln!(f)?;
            for (format, path) in reports {
                writeln!(f, "- {format}: {}", path.display())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::StepOutcome;

    fn result(success: bool) -> ExecutionResult {
        ExecutionResult {
            task_id: "t1".into(),
            success,
            results: vec![StepOutcome {
                step_id: "s1".into(),
                description: "Fetch".into(),
                tool_name: "web_search_tool".into(),
                result: if success {
                    json!("ok")
                } else {
                    json!({"error": "timed out"})
                },
                status: if success {
                    StepStatus::Completed
                } else {
                    StepStatus::Failed
                },
            }],
            error_message: None,
            execution_time: 0.25,
            files_generated: vec!["/tmp/out.txt".into()],
        }
    }

    #[test]
    fn test_success_summary() {
        let reports = BTreeMap::from([(ReportFormat::Json, PathBuf::from("/r/report.json"))]);
        let r = result(true);
        let output = RunSummary::new(&r).with_reports(&reports).to_string();

        assert!(output.starts_with("# ✓ Task completed"));
        assert!(output.contains("1. Fetch `web_search_tool` (✓ Completed)"));
        assert!(output.contains("- /tmp/out.txt"));
        assert!(output.contains("- json: /r/report.json"));
    }

    #[test]
    fn test_failure_summary_shows_step_error() {
        let r = result(false);
        let output = RunSummary::new(&r).to_string();

        assert!(output.starts_with("# ✗ Task failed"));
        assert!(output.contains("   - timed out"));
        assert!(!output.contains("## Reports"));
    }
}
