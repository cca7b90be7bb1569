//! Uniform dispatch boundary to the external tool implementations.
//!
//! The [`ToolGateway`] owns a lazily loaded catalog of [`ToolSpec`]s and a
//! [`ToolTransport`] that actually reaches the tools. Calls are validated
//! against the catalog, forwarded without retries, and their responses
//! normalized into a single JSON value.

mod local;
#[cfg(feature = "mcp")]
pub mod mcp;
mod response;

use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use local::LocalTransport;
pub use response::{ContentItem, ToolResponse, ToolSpec};

use crate::error::{OrchestratorError, Result};

/// Remote protocol used by the gateway.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Fetches the full tool catalog.
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>>;

    /// Invokes one tool with its arguments.
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>)
        -> anyhow::Result<ToolResponse>;
}

/// Catalog-validated tool dispatcher.
pub struct ToolGateway {
    transport: Arc<dyn ToolTransport>,
    catalog: RwLock<Vec<ToolSpec>>,
}

impl ToolGateway {
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        Self {
            transport,
            catalog: RwLock::new(Vec::new()),
        }
    }

    /// Calls `tool` with `arguments` and returns the normalized result.
    pub async fn call(&self, tool: &str, arguments: Map<String, Value>) -> Result<Value> {
        if !self.is_available(tool).await? {
            return Err(OrchestratorError::ToolNotAvailable {
                name: tool.to_string(),
            });
        }

        log::debug!("Invoking tool {tool}");
        let response = self
            .transport
            .call_tool(tool, arguments)
            .await
            .map_err(|e| OrchestratorError::tool_invocation(tool).with_message(format!("{e:#}")))?;
        Ok(response.normalize())
    }

    /// Returns the catalog, loading it first if it is empty.
    pub async fn catalog(&self) -> Result<Vec<ToolSpec>> {
        let cached = self.read_catalog().clone();
        if !cached.is_empty() {
            return Ok(cached);
        }
        self.reload().await?;
        Ok(self.read_catalog().clone())
    }

    pub async fn tool_names(&self) -> Result<Vec<String>> {
        Ok(self.catalog().await?.into_iter().map(|t| t.name).collect())
    }

    pub async fn is_available(&self, tool: &str) -> Result<bool> {
        Ok(self.catalog().await?.iter().any(|t| t.name == tool))
    }

    /// Renders the catalog as a bullet list for planner prompts.
    pub async fn describe_for_planning(&self) -> Result<String> {
        let mut out = String::new();
        for tool in self.catalog().await? {
            let _ = writeln!(out, "- {}: {}", tool.name, tool.description);
            if let Some(props) = tool.input_schema.get("properties").and_then(Value::as_object) {
                let params: Vec<&str> = props.keys().map(String::as_str).collect();
                if !params.is_empty() {
                    let _ = writeln!(out, "  args: {}", params.join(", "));
                }
            }
        }
        Ok(out)
    }

    /// Replaces the cached catalog with a fresh listing from the transport.
    pub async fn reload(&self) -> Result<usize> {
        let tools = self.transport.list_tools().await.map_err(|e| {
            OrchestratorError::tool_invocation("tools/list").with_message(format!("{e:#}"))
        })?;

        log::info!("Loaded {} tools", tools.len());
        for tool in &tools {
            log::debug!("  {}: {}", tool.name, tool.description);
        }

        let count = tools.len();
        *self
            .catalog
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = tools;
        Ok(count)
    }

    fn read_catalog(&self) -> std::sync::RwLockReadGuard<'_, Vec<ToolSpec>> {
        self.catalog
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ToolGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGateway")
            .field("catalog", &*self.read_catalog())
            .finish_non_exhaustive()
    }
}
