//! MCP client transport over a child process's stdio.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, CallToolResult},
    service::RunningService,
    transport::TokioChildProcess,
    RoleClient, ServiceExt,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::process::Command;

use super::{ContentItem, ToolResponse, ToolSpec, ToolTransport};
use crate::error::{FsResultExt, OrchestratorError, Result};

/// How to launch an MCP tool server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl McpServerConfig {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).fs_context(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// A connected MCP client session.
pub struct McpTransport {
    name: String,
    service: RunningService<RoleClient, ()>,
}

impl McpTransport {
    /// Spawns the server process and performs the MCP handshake.
    pub async fn connect(config: &McpServerConfig) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command.args(&config.args).envs(&config.env);

        let transport = TokioChildProcess::new(command).map_err(|e| {
            OrchestratorError::Configuration {
                message: format!("Failed to spawn MCP server '{}': {e}", config.name),
            }
        })?;

        let service = ().serve(transport).await.map_err(|e| {
            OrchestratorError::Configuration {
                message: format!("MCP handshake with '{}' failed: {e}", config.name),
            }
        })?;

        log::info!("Connected to MCP server {}", config.name);
        Ok(Self {
            name: config.name.clone(),
            service,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ToolTransport for McpTransport {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .with_context(|| format!("listing tools on {}", self.name))?;

        Ok(tools
            .into_iter()
            .map(|tool| ToolSpec {
                name: tool.name.to_string(),
                description: tool.description.as_deref().unwrap_or_default().to_string(),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResponse> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .with_context(|| format!("calling {name} on {}", self.name))?;

        into_response(&result)
    }
}

/// Maps a call result onto [`ToolResponse`]; a remote error flag becomes `Err`.
fn into_response(result: &CallToolResult) -> anyhow::Result<ToolResponse> {
    let wire = serde_json::to_value(result)?;

    let items: Vec<ContentItem> = wire
        .get("content")
        .and_then(Value::as_array)
        .map(|content| content.iter().map(content_item).collect())
        .unwrap_or_default();

    if wire.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        let message = items
            .iter()
            .find_map(|item| match item {
                ContentItem::Text(text) => Some(text.clone()),
                ContentItem::Other(_) => None,
            })
            .unwrap_or_else(|| "tool reported an error".to_string());
        return Err(anyhow!(message));
    }

    match wire.get("structuredContent") {
        Some(structured) if !structured.is_null() => {
            Ok(ToolResponse::Structured(structured.clone()))
        }
        _ => Ok(ToolResponse::Content(items)),
    }
}

fn content_item(raw: &Value) -> ContentItem {
    match (raw.get("type").and_then(Value::as_str), raw.get("text")) {
        (Some("text"), Some(Value::String(text))) => ContentItem::Text(text.clone()),
        _ => ContentItem::Other(raw.clone()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_content_item_decoding() {
        assert_eq!(
            content_item(&json!({"type": "text", "text": "hi"})),
            ContentItem::Text("hi".to_string())
        );
        let image = json!({"type": "image", "data": "AAA", "mimeType": "image/png"});
        assert_eq!(content_item(&image), ContentItem::Other(image.clone()));
    }

    #[test]
    fn test_config_parses_with_defaults() {
        let config: McpServerConfig =
            serde_json::from_value(json!({"name": "tools", "command": "tool-server"})).unwrap();
        assert!(config.args.is_empty());
        assert!(config.env.is_empty());
    }
}
