//! In-process tool transport backed by registered closures.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{ToolResponse, ToolSpec, ToolTransport};

type Handler = Arc<dyn Fn(Map<String, Value>) -> anyhow::Result<Value> + Send + Sync>;

/// Transport whose tools are plain Rust functions.
#[derive(Default, Clone)]
pub struct LocalTransport {
    tools: BTreeMap<String, (ToolSpec, Handler)>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool. A later registration under the same name replaces it.
    pub fn with_tool<F>(mut self, spec: ToolSpec, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.tools
            .insert(spec.name.clone(), (spec, Arc::new(handler)));
        self
    }
}

#[async_trait]
impl ToolTransport for LocalTransport {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>> {
        Ok(self.tools.values().map(|(spec, _)| spec.clone()).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResponse> {
        let (_, handler) = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow!("unknown tool '{name}'"))?;
        handler(arguments).map(ToolResponse::Structured)
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
