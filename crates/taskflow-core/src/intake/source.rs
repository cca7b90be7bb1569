//! Shipped [`PlanSource`] adapters.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{PlanRequest, PlanSource, PlannerReply};

/// Runs an external planner per request.
///
/// The request is written to the child's stdin as JSON and the reply is
/// read from its stdout.
#[derive(Debug, Clone)]
pub struct CommandPlanSource {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPlanSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl PlanSource for CommandPlanSource {
    async fn plan(&self, request: &PlanRequest) -> anyhow::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start planner {}", self.program.display()))?;

        // The planner may reply before it has read the whole request, so the
        // write and the reads run together. Dropping stdin closes the pipe.
        let payload = serde_json::to_vec(request)?;
        let stdin = child.stdin.take();
        let send = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(&payload).await,
                None => Ok(()),
            }
        };
        let (sent, output) = tokio::join!(send, child.wait_with_output());

        let output = output.context("Planner did not finish")?;
        if !output.status.success() {
            bail!(
                "Planner exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        match sent {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                log::debug!("Planner closed stdin before reading the full request");
            }
            other => other.context("Failed to send request to planner")?,
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Returns the same document for every request.
#[derive(Debug, Clone)]
pub struct FixedPlanSource {
    document: String,
}

impl FixedPlanSource {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file {}", path.display()))?;
        Ok(Self::new(document))
    }
}

#[async_trait]
impl PlanSource for FixedPlanSource {
    async fn plan(&self, _request: &PlanRequest) -> anyhow::Result<String> {
        Ok(self.document.clone())
    }
}

/// Always yields the single-step fallback plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPlanSource;

#[async_trait]
impl PlanSource for FallbackPlanSource {
    async fn plan(&self, request: &PlanRequest) -> anyhow::Result<String> {
        let reply = PlannerReply::fallback(&request.user_input);
        Ok(serde_json::to_string(&reply)?)
    }
}
