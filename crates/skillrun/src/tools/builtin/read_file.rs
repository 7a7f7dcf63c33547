//! File read tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::tools::{
    required_str, truncate_output, ParameterProperty, ParameterSchema, Tool, ToolContext,
    ToolResult,
};

/// Tool for reading file contents
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Paths are absolute or relative to the working directory, and may be confined to configured folders."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("path", ParameterProperty::string("The path to the file to read"))
            .with_property(
                "offset",
                ParameterProperty::number("Line number to start reading from (1-indexed, default: 1)")
                    .with_default(Value::Number(1.into())),
            )
            .with_property(
                "limit",
                ParameterProperty::number("Maximum number of lines to read (default: unlimited)"),
            )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult> {
        let path = match ctx.allowed_path(required_str(args, "path")?) {
            Ok(path) => path,
            Err(e) => return Ok(ToolResult::error(format!("{:#}", e))),
        };
        if !path.is_file() {
            let reason = if path.exists() { "Not a file" } else { "File not found" };
            return Ok(ToolResult::error(format!("{}: {}", reason, path.display())));
        }

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                return Ok(ToolResult::error(format!("Failed to read {}: {}", path.display(), e)));
            }
        };

        let window = LineWindow::from_args(args);
        let output = match window.render(&content) {
            Some(body) => format!(
                "File: {} ({} lines total)\n{}",
                path.display(),
                content.lines().count(),
                body
            ),
            None => format!(
                "File is empty or offset {} exceeds file length ({} lines)",
                window.skip + 1,
                content.lines().count()
            ),
        };
        Ok(ToolResult::success(truncate_output(output, ctx.max_output_len)))
    }
}

/// Which lines to return: `offset` is 1-indexed, `limit` unbounded when absent
struct LineWindow {
    skip: usize,
    take: usize,
}

impl LineWindow {
    fn from_args(args: &Value) -> Self {
        let number = |key: &str| args.get(key).and_then(Value::as_u64).map(|n| n as usize);
        Self {
            skip: number("offset").map_or(0, |n| n.saturating_sub(1)),
            take: number("limit").unwrap_or(usize::MAX),
        }
    }

    /// Numbered lines in the window, or `None` when it selects nothing
    fn render(&self, content: &str) -> Option<String> {
        let numbered: Vec<String> = content
            .lines()
            .enumerate()
            .skip(self.skip)
            .take(self.take)
            .map(|(i, line)| format!("{:>6}\t{}", i + 1, line))
            .collect();
        (!numbered.is_empty()).then(|| numbered.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[tokio::test]
    async fn test_read_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "line 1").unwrap();
        writeln!(temp, "line 2").unwrap();

        let args = json!({ "path": temp.path().to_str().unwrap() });
        let result = ReadFileTool.execute(&args, &ToolContext::default()).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("line 1"));
        assert!(result.output.contains("line 2"));
        assert!(result.output.contains("(2 lines total)"));
    }

    #[tokio::test]
    async fn test_read_file_with_offset_limit() {
        let mut temp = NamedTempFile::new().unwrap();
        for i in 1..=10 {
            writeln!(temp, "line {}", i).unwrap();
        }

        let args = json!({
            "path": temp.path().to_str().unwrap(),
            "offset": 3,
            "limit": 2
        });
        let result = ReadFileTool.execute(&args, &ToolContext::default()).await.unwrap();
        assert!(result.output.contains("line 3"));
        assert!(result.output.contains("line 4"));
        assert!(!result.output.contains("line 5"));
    }

    #[tokio::test]
    async fn test_read_relative_to_working_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember the milk\n").unwrap();

        let ctx = ToolContext::new(dir.path().to_path_buf());
        let result = ReadFileTool.execute(&json!({ "path": "notes.txt" }), &ctx).await.unwrap();
        assert!(result.output.contains("remember the milk"));
    }

    #[tokio::test]
    async fn test_read_outside_allowed_folders_denied() {
        let root = TempDir::new().unwrap();
        let project = root.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(root.path().join("secret.txt"), "hunter2\n").unwrap();

        let ctx = ToolContext::new(project.clone()).with_allowed_dirs(vec![project]);
        let result = ReadFileTool
            .execute(&json!({ "path": "../secret.txt" }), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Access denied"));
    }

    #[test]
    fn test_line_window() {
        let window = LineWindow::from_args(&json!({ "offset": 2, "limit": 1 }));
        assert_eq!(window.render("a\nb\nc").as_deref(), Some("     2\tb"));

        let past_end = LineWindow::from_args(&json!({ "offset": 9 }));
        assert!(past_end.render("a\nb").is_none());
    }

    #[tokio::test]
    async fn test_read_nonexistent_file() {
        let args = json!({ "path": "/nonexistent/path/file.txt" });
        let result = ReadFileTool.execute(&args, &ToolContext::default()).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[tokio::test]
    async fn test_missing_path_argument() {
        let err = ReadFileTool.execute(&json!({}), &ToolContext::default()).await.unwrap_err();
        assert!(err.to_string().contains("Missing required parameter: path"));
    }
}
