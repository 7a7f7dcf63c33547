//! Tool registry: the default `ToolExecutor`

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use skillrun_core::ToolDefinition;
use tracing::{debug, instrument, warn};

use super::{Tool, ToolContext, ToolExecutor};

/// Registry of available tools, keyed by name
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            tools: BTreeMap::new(),
            ctx,
        }
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names
    pub fn list_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    #[instrument(skip(self, raw_args), fields(tool = %name))]
    async fn execute(&self, name: &str, raw_args: &str) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown tool: {}", name))?;

        // Models sometimes send "" for a no-argument call
        let args: Value = if raw_args.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw_args).context("invalid tool arguments")?
        };

        debug!("Executing tool");
        let result = tool.execute(&args, &self.ctx).await?;
        if !result.success {
            warn!(error = ?result.error, "Tool execution failed");
        }
        result.into_text()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_names())
            .finish()
    }
}
