//! Display implementations for the plan and task models.
//!
//! Output is markdown so the CLI can hand it straight to the terminal
//! renderer.

use std::fmt;

use serde_json::Value;

use super::datetime::LocalDateTime;
use crate::events::render::truncate;
use crate::models::{Plan, Step, StepStatus, Task, TaskProgress};

const RESULT_PREVIEW: usize = 400;

impl Step {
    fn fmt_numbered(&self, number: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_final { " [final]" } else { "" };
        writeln!(
            f,
            "### {number}. {} ({}){marker}",
            self.description,
            self.status.with_icon()
        )?;
        writeln!(f)?;
        writeln!(f, "- Tool: `{}`", self.tool_name)?;
        if !self.arguments.is_empty() {
            writeln!(f, "- Arguments: `{}`", Value::Object(self.arguments.clone()))?;
        }
        if let Some(secs) = self.duration_secs() {
            writeln!(f, "- Duration: {secs:.2}s")?;
        }
        writeln!(f)?;

        match (self.status, &self.result, &self.error) {
            (StepStatus::Failed, _, Some(error)) => {
                writeln!(f, "**Error**: {error}")?;
                writeln!(f)?;
            }
            (StepStatus::Completed, Some(result), _) => {
                let text = match result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                writeln!(f, "```")?;
                writeln!(f, "{}", truncate(&text, RESULT_PREVIEW))?;
                writeln!(f, "```")?;
                writeln!(f)?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_numbered(1, f)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return writeln!(f, "No steps in this plan.");
        }
        for (i, step) in self.steps.iter().enumerate() {
            step.fmt_numbered(i + 1, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Task {}", self.task_id)?;
        writeln!(f)?;
        writeln!(f, "> {}", self.user_input)?;
        writeln!(f)?;
        writeln!(f, "- Status: {}", self.status)?;
        writeln!(f, "- Type: {}", self.task_type)?;
        writeln!(f, "- Complexity: {}", self.complexity)?;
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;

        if self.requires_clarification() {
            writeln!(f, "\n## Questions")?;
            writeln!(f)?;
            for question in &self.clarification_questions {
                writeln!(f, "- {question}")?;
            }
            return Ok(());
        }

        writeln!(f, "\n## Steps")?;
        writeln!(f)?;
        write!(f, "{}", self.plan)
    }
}

impl fmt::Display for TaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Task {} ({})", self.task_id, self.status)?;
        writeln!(f)?;
        writeln!(
            f,
            "- Progress: {}/{} steps ({:.0}%)",
            self.completed, self.total, self.percentage
        )?;
        writeln!(f, "- Type: {}", self.task_type)?;
        writeln!(f, "- Complexity: {}", self.complexity)?;
        if let Some(step) = &self.current_step {
            writeln!(f, "- Running: {step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use crate::models::{Plan, Step, Task};

    #[test]
    fn test_plan_numbers_steps_and_shows_errors() {
        let mut ok = Step::new("Search the web", "web_search_tool", Map::new());
        ok.start().unwrap();
        ok.complete(json!("three results")).unwrap();
        let mut bad = Step::new("Write file", "file_generation_tool", Map::new()).with_final(true);
        bad.start().unwrap();
        bad.fail("disk full").unwrap();

        let output = Plan::new(vec![ok, bad]).to_string();

        assert!(output.contains("### 1. Search the web (✓ Completed)"));
        assert!(output.contains("### 2. Write file (✗ Failed) [final]"));
        assert!(output.contains("three results"));
        assert!(output.contains("**Error**: disk full"));
    }

    #[test]
    fn test_clarification_task_lists_questions() {
        let task = Task::clarification("make it", vec!["Which format?".into()]);
        let output = task.to_string();

        assert!(output.contains("## Questions"));
        assert!(output.contains("- Which format?"));
        assert!(!output.contains("## Steps"));
    }

    #[test]
    fn test_progress_display() {
        let task = Task::new("nothing", Plan::empty());
        let output = task.progress().to_string();
        assert!(output.contains("0/0 steps (0%)"));
    }
}
