//! Shell command execution tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::tools::{
    required_str, truncate_output, ParameterProperty, ParameterSchema, Tool, ToolContext,
    ToolResult,
};

/// Tool for executing shell commands in the working directory
pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory and return its output."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("command", ParameterProperty::string("The shell command to execute"))
            .with_property(
                "timeout",
                ParameterProperty::number("Timeout in seconds (default: 120)")
                    .with_default(Value::Number(120.into())),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult> {
        let command = required_str(args, "command")?;

        let timeout_secs = args
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(ctx.command_timeout_secs);

        if !ctx.working_dir.exists() {
            return Ok(ToolResult::error(format!(
                "Working directory does not exist: {}",
                ctx.working_dir.display()
            )));
        }

        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg)
            .arg(command)
            .current_dir(&ctx.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = timeout(Duration::from_secs(timeout_secs), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let mut combined_output = String::new();
                if !stdout.is_empty() {
                    combined_output.push_str(&stdout);
                }
                if !stderr.is_empty() {
                    if !combined_output.is_empty() {
                        combined_output.push_str("\n--- stderr ---\n");
                    }
                    combined_output.push_str(&stderr);
                }

                let combined_output = truncate_output(combined_output, ctx.max_output_len);

                if output.status.success() {
                    Ok(ToolResult::success(combined_output))
                } else {
                    let exit_code = output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    Ok(ToolResult::failure(
                        combined_output,
                        format!("Command exited with code {}", exit_code),
                    ))
                }
            }
            Ok(Err(e)) => Ok(ToolResult::error(format!("Failed to execute command: {}", e))),
            Err(_) => Ok(ToolResult::error(format!(
                "Command timed out after {} seconds",
                timeout_secs
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_echo() {
        let args = json!({ "command": "echo 'hello world'" });
        let result = RunCommandTool.execute(&args, &ToolContext::default()).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("hello world"));
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("marker.txt"), "x").unwrap();

        let ctx = ToolContext::new(temp_dir.path().to_path_buf());
        let result = RunCommandTool.execute(&json!({ "command": "ls" }), &ctx).await.unwrap();
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_failure_exit_code() {
        let args = json!({ "command": "echo oops >&2; exit 3" });
        let result = RunCommandTool.execute(&args, &ToolContext::default()).await.unwrap();
        assert!(!result.success);
        assert!(result.output.contains("oops"));
        assert_eq!(result.error.as_deref(), Some("Command exited with code 3"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let args = json!({ "command": "sleep 10", "timeout": 1 });
        let result = RunCommandTool.execute(&args, &ToolContext::default()).await.unwrap();
        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("timed out"));
    }
}
