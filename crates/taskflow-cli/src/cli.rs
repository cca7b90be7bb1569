//! Command arguments and their handlers.
//!
//! Argument structs carry the clap derives and convert into the core
//! parameter types from `taskflow_core::params`, so the orchestrator never
//! sees CLI framework types:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Orchestrator
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use taskflow_core::{
    artifacts::DEFAULT_USER,
    display::{HistoryEntries, RunSummary, ToolCatalog},
    events::render,
    intake::{CommandPlanSource, FixedPlanSource, PlanSource},
    params::{PurgeResults, ReportHistory, SubmitTask},
    Event, Orchestrator, ReportFormat, RunOutcome,
};

use crate::renderer::TerminalRenderer;

/// Where plans come from
///
/// Without either flag every request gets the single-step fallback plan.
#[derive(Args, Default)]
pub struct PlannerArgs {
    /// JSON planner reply used for every request
    #[arg(long, conflicts_with = "planner_command")]
    pub plan_file: Option<PathBuf>,
    /// Program that reads `{"user_input", "tools"}` on stdin and prints a
    /// planner reply on stdout
    #[arg(long)]
    pub planner_command: Option<PathBuf>,
    /// Extra argument passed to the planner program (repeatable)
    #[arg(long = "planner-arg", allow_hyphen_values = true)]
    pub planner_args: Vec<String>,
}

impl PlannerArgs {
    /// Builds the configured plan source, if any.
    pub fn source(&self) -> Result<Option<Arc<dyn PlanSource>>> {
        if let Some(path) = &self.plan_file {
            let source = FixedPlanSource::from_file(path)?;
            return Ok(Some(Arc::new(source)));
        }
        if let Some(program) = &self.planner_command {
            let source =
                CommandPlanSource::new(program).with_args(self.planner_args.iter().cloned());
            return Ok(Some(Arc::new(source)));
        }
        Ok(None)
    }
}

/// Plan and execute a request
#[derive(Args)]
pub struct RunArgs {
    /// The request, in plain language
    pub text: String,
    /// User the task runs for; decides the artifact directory
    #[arg(short, long, default_value = DEFAULT_USER)]
    pub user: String,
    #[command(flatten)]
    pub planner: PlannerArgs,
    /// Report formats to save, comma-separated
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_value = "json",
        help = "Report formats to save (json, text)"
    )]
    pub format: Vec<ReportFormatArg>,
    /// Do not print progress events while the task runs
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunArgs {
    pub fn report_formats(&self) -> Vec<ReportFormat> {
        self.format.iter().copied().map(ReportFormat::from).collect()
    }
}

impl From<&RunArgs> for SubmitTask {
    fn from(val: &RunArgs) -> Self {
        SubmitTask {
            user_id: val.user.clone(),
            text: val.text.clone(),
        }
    }
}

/// Show saved task reports
#[derive(Args)]
pub struct HistoryArgs {
    /// Maximum number of reports to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,
}

impl From<HistoryArgs> for ReportHistory {
    fn from(val: HistoryArgs) -> Self {
        ReportHistory { limit: val.limit }
    }
}

/// Delete old reports and raw dumps
#[derive(Args)]
pub struct PurgeArgs {
    /// Delete files older than this many days
    #[arg(long, default_value_t = 30)]
    pub days: u64,
}

impl From<PurgeArgs> for PurgeResults {
    fn from(val: PurgeArgs) -> Self {
        PurgeResults { days: val.days }
    }
}

/// Command-line representation of report formats
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum ReportFormatArg {
    /// Structured JSON report
    Json,
    /// Plain-text report
    Text,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(val: ReportFormatArg) -> Self {
        match val {
            ReportFormatArg::Json => ReportFormat::Json,
            ReportFormatArg::Text => ReportFormat::Text,
        }
    }
}

/// Runs CLI commands against an orchestrator and renders the results.
pub struct Cli {
    orchestrator: Orchestrator,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(orchestrator: Orchestrator, renderer: TerminalRenderer) -> Self {
        Self {
            orchestrator,
            renderer,
        }
    }

    /// Executes one request and prints the outcome.
    ///
    /// Progress events go to stderr so stdout only carries the summary.
    pub async fn run(&self, args: RunArgs) -> Result<()> {
        let params = SubmitTask::from(&args);

        let subscription = (!args.quiet).then(|| {
            self.orchestrator
                .subscribe_with(&params.user_id, |event: &Event| {
                    eprintln!("{}", render::render(event));
                    Ok(())
                })
        });

        let outcome = self
            .orchestrator
            .run(&params.user_id, &params.text)
            .await
            .context("Failed to run task");

        if let Some(id) = subscription {
            self.orchestrator.unsubscribe(&params.user_id, id);
        }
        self.render_outcome(&outcome?)
    }

    fn render_outcome(&self, outcome: &RunOutcome) -> Result<()> {
        let Some(result) = &outcome.result else {
            // Clarification requests list their questions.
            return self.renderer.render(&outcome.task.to_string());
        };

        if outcome.task.is_conversation {
            let reply = result
                .results
                .first()
                .and_then(|r| r.result.get("response"))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            return self.renderer.render(&format!("{reply}\n"));
        }

        let files = self.orchestrator.file_summary(&result.task_id);
        let summary = RunSummary::new(result)
            .with_files(files.as_ref())
            .with_reports(&outcome.reports);
        self.renderer.render(&summary.to_string())?;

        if !result.success {
            bail!("Task {} failed", result.task_id);
        }
        Ok(())
    }

    pub async fn history(&self, params: ReportHistory) -> Result<()> {
        let entries = self
            .orchestrator
            .report_history(params.limit)
            .await
            .context("Failed to read report history")?;
        self.renderer.render(&HistoryEntries(entries).to_string())
    }

    pub async fn purge(&self, params: PurgeResults) -> Result<()> {
        let removed = self
            .orchestrator
            .purge_results(params.older_than())
            .await
            .context("Failed to purge results")?;
        self.renderer.render(&format!(
            "Removed {removed} files older than {} days.\n",
            params.days
        ))
    }

    pub async fn tools(&self) -> Result<()> {
        let tools = self
            .orchestrator
            .tools()
            .await
            .context("Failed to load tool catalog")?;
        self.renderer.render(&ToolCatalog(tools).to_string())
    }
}
