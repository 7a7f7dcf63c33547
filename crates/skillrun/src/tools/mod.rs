//! Tool framework: the executor side of model tool calls

pub mod builtin;
pub mod normalize;
pub mod registry;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillrun_core::ToolDefinition;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use normalize::{SuffixDelimiter, ToolNameNormalizer, Verbatim};
pub use registry::ToolRegistry;

/// Result of tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failed result
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Create a failed result with output
    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }

    /// Collapse into the text handed back to the model.
    ///
    /// Failures become `Err` so the dispatcher renders them uniformly.
    pub fn into_text(self) -> Result<String> {
        if self.success {
            return Ok(self.output);
        }

        let error = self.error.unwrap_or_else(|| "tool failed".to_string());
        if self.output.is_empty() {
            anyhow::bail!("{}", error)
        } else {
            anyhow::bail!("{}\n{}", error, self.output)
        }
    }
}

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Current working directory
    pub working_dir: PathBuf,
    /// Maximum output length (truncate if exceeded)
    pub max_output_len: usize,
    /// Default timeout for command execution in seconds
    pub command_timeout_secs: u64,
    /// Folders file tools are confined to; empty means anywhere
    pub allowed_dirs: Vec<PathBuf>,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_output_len: 50000,
            command_timeout_secs: 120,
            allowed_dirs: Vec::new(),
        }
    }
}

impl ToolContext {
    /// Create a new context with the given working directory
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_allowed_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.allowed_dirs = dirs;
        self
    }

    /// Resolve a tool-supplied path against the working directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.working_dir.join(path)
        }
    }

    /// Resolve a path and confine it to `allowed_dirs`.
    ///
    /// Paths are canonicalized first so `..` and symlinks cannot step outside.
    pub fn allowed_path(&self, path: &str) -> Result<PathBuf> {
        let resolved = self.resolve_path(path);
        if self.allowed_dirs.is_empty() {
            return Ok(resolved);
        }

        let canonical = resolved
            .canonicalize()
            .with_context(|| format!("Cannot resolve {}", resolved.display()))?;
        if !self.allowed_dirs.iter().any(|dir| is_within(&canonical, dir)) {
            bail!("Access denied: {} is outside the allowed folders", resolved.display());
        }
        Ok(canonical)
    }
}

fn is_within(path: &Path, dir: &Path) -> bool {
    dir.canonicalize().map(|dir| path.starts_with(dir)).unwrap_or(false)
}

/// Schema for a tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterProperty {
    /// Parameter type (string, number, boolean, array, object)
    #[serde(rename = "type")]
    pub param_type: String,
    /// Parameter description
    pub description: String,
    /// Default value if applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterProperty {
    fn typed(param_type: &str, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.to_string(),
            description: description.into(),
            default: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::typed("number", description)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Schema describing tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Type is always "object"
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Parameter properties
    pub properties: HashMap<String, ParameterProperty>,
    /// Required parameter names
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), prop);
        self.required.push(name);
        self
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// The Tool trait that all built-in tools implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get a description of what the tool does
    fn description(&self) -> &str;

    /// Get the parameter schema
    fn parameters_schema(&self) -> ParameterSchema;

    /// Execute the tool with already-parsed arguments
    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult>;

    /// Convert to a tool definition for the model
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.name(),
            self.description(),
            serde_json::to_value(self.parameters_schema()).unwrap_or_default(),
        )
    }
}

/// What the agent loop dispatches tool calls to.
///
/// `execute` receives the raw argument text exactly as the model produced it;
/// malformed input must come back as `Err`, never a panic.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Static schema catalog advertised to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run one tool call and return the text for the model
    async fn execute(&self, name: &str, raw_args: &str) -> Result<String>;
}

/// Required string argument
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {}", key))
}

/// Truncate output at a char boundary, noting the cut
pub(crate) fn truncate_output(output: String, max_len: usize) -> String {
    if output.len() <= max_len {
        return output;
    }

    let mut end = max_len;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n\n[Output truncated at {} characters]", &output[..end], end)
}
