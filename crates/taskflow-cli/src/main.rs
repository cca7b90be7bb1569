//! TaskFlow CLI Application
//!
//! Command-line interface for the TaskFlow orchestration engine.

mod args;
mod cli;
mod mcp;
mod renderer;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use mcp::{run_stdio_server, TaskFlowMcpServer};
use renderer::TerminalRenderer;
use taskflow_core::gateway::mcp::{McpServerConfig, McpTransport};
use taskflow_core::OrchestratorBuilder;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        data_dir,
        tool_server,
        no_color,
        command,
    } = Args::parse();

    let mut builder = OrchestratorBuilder::new().with_data_dir(data_dir);

    if let Some(path) = tool_server {
        let config = McpServerConfig::load(&path)
            .with_context(|| format!("Failed to read tool server config {}", path.display()))?;
        let transport = McpTransport::connect(&config)
            .await
            .with_context(|| format!("Failed to connect to tool server {}", config.name))?;
        builder = builder.with_transport(Arc::new(transport));
    }

    if let Some(source) = command.planner().map(|p| p.source()).transpose()?.flatten() {
        builder = builder.with_plan_source(source);
    }

    if let Run(args) = &command {
        builder = builder.with_report_formats(args.report_formats());
    }

    let orchestrator = builder
        .build()
        .await
        .context("Failed to initialize orchestrator")?;

    let renderer = TerminalRenderer::new(!no_color && io::stdout().is_terminal());

    info!("TaskFlow started");

    match command {
        Run(args) => Cli::new(orchestrator, renderer).run(args).await,
        History(args) => Cli::new(orchestrator, renderer).history(args.into()).await,
        Purge(args) => Cli::new(orchestrator, renderer).purge(args.into()).await,
        Tools => Cli::new(orchestrator, renderer).tools().await,
        Serve { .. } => {
            info!("Starting TaskFlow MCP server");
            run_stdio_server(TaskFlowMcpServer::new(orchestrator))
                .await
                .context("MCP server failed")
        }
    }
}
