use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::{HistoryArgs, PlannerArgs, PurgeArgs, RunArgs};

/// Command-line interface for the TaskFlow orchestration engine
///
/// TaskFlow turns a free-form request into a plan of tool calls, executes it,
/// collects the files the tools produce and saves a report. Tools are reached
/// through an MCP tool server; the MCP server mode exposes the per-user
/// session API to AI assistants.
#[derive(Parser)]
#[command(version, about, name = "taskflow")]
pub struct Args {
    /// Directory for artifacts and reports. Defaults to
    /// $XDG_DATA_HOME/taskflow
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// JSON file describing the MCP tool server to launch
    /// (`{"name", "command", "args", "env"}`)
    #[arg(long, global = true)]
    pub tool_server: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the TaskFlow CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Plan and execute a request, then print the outcome
    #[command(alias = "r")]
    Run(RunArgs),
    /// Show saved task reports, newest first
    #[command(alias = "h")]
    History(HistoryArgs),
    /// Delete stored reports older than a number of days
    Purge(PurgeArgs),
    /// List the tools the tool server offers
    Tools,
    /// Start the MCP server on stdio
    Serve {
        #[command(flatten)]
        planner: PlannerArgs,
    },
}

impl Commands {
    /// Planner options, for commands that plan requests.
    pub fn planner(&self) -> Option<&PlannerArgs> {
        match self {
            Commands::Run(args) => Some(&args.planner),
            Commands::Serve { planner } => Some(planner),
            _ => None,
        }
    }
}
