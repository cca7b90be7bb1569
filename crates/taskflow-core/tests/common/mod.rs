use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use taskflow_core::gateway::{LocalTransport, ToolResponse, ToolSpec, ToolTransport};
use taskflow_core::intake::FixedPlanSource;
use taskflow_core::{Orchestrator, OrchestratorBuilder, PlanRequest, PlanSource};
use tempfile::TempDir;

/// Local tools shared by the integration tests.
pub fn local_tools() -> LocalTransport {
    LocalTransport::new()
        .with_tool(ToolSpec::new("echo_tool", "Echoes its arguments"), |a| {
            Ok(Value::Object(a))
        })
        .with_tool(ToolSpec::new("fail_tool", "Always fails"), |_| {
            Err(anyhow!("tool exploded"))
        })
        .with_tool(
            ToolSpec::new("file_generation_tool", "Writes a text file"),
            |a| {
                let dir = a
                    .get("output_dir")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("missing output_dir"))?;
                let name = a
                    .get("file_name")
                    .and_then(Value::as_str)
                    .unwrap_or("out.txt");
                let path = Path::new(dir).join(name);
                std::fs::write(&path, "generated content")?;
                Ok(json!({"file_path": path, "file_type": "text", "success": true}))
            },
        )
}

/// Wraps the local tools and adds `slow_tool`, which sleeps before echoing.
pub struct SlowTransport {
    inner: LocalTransport,
    delay: Duration,
}

impl SlowTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: local_tools(),
            delay,
        }
    }
}

#[async_trait]
impl ToolTransport for SlowTransport {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>> {
        let mut tools = self.inner.list_tools().await?;
        tools.push(ToolSpec::new("slow_tool", "Sleeps, then echoes"));
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<ToolResponse> {
        if name == "slow_tool" {
            tokio::time::sleep(self.delay).await;
            return Ok(ToolResponse::Structured(Value::Object(arguments)));
        }
        self.inner.call_tool(name, arguments).await
    }
}

/// Returns a fixed plan, taking `delay` longer for requests containing `marker`.
pub struct SlowPlanSource {
    plan: String,
    marker: String,
    delay: Duration,
}

impl SlowPlanSource {
    pub fn new(plan: &Value, marker: &str, delay: Duration) -> Self {
        Self {
            plan: plan.to_string(),
            marker: marker.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl PlanSource for SlowPlanSource {
    async fn plan(&self, request: &PlanRequest) -> anyhow::Result<String> {
        if request.user_input.contains(&self.marker) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.plan.clone())
    }
}

/// Builds an orchestrator over a fresh temp dir that always plans `plan`.
pub async fn create_test_orchestrator(plan: Value) -> (TempDir, Orchestrator) {
    create_with_transport(plan, Arc::new(local_tools())).await
}

pub async fn create_with_transport(
    plan: Value,
    transport: Arc<dyn ToolTransport>,
) -> (TempDir, Orchestrator) {
    create_with_plan_source(Arc::new(FixedPlanSource::new(plan.to_string())), transport).await
}

pub async fn create_with_plan_source(
    source: Arc<dyn PlanSource>,
    transport: Arc<dyn ToolTransport>,
) -> (TempDir, Orchestrator) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let orchestrator = OrchestratorBuilder::new()
        .with_data_dir(Some(temp_dir.path()))
        .with_transport(transport)
        .with_plan_source(source)
        .build()
        .await
        .expect("Failed to create orchestrator");
    (temp_dir, orchestrator)
}
