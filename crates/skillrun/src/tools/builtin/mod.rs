//! Built-in tools

mod calculate;
mod read_file;
mod run_command;

pub use calculate::CalculateTool;
pub use read_file::ReadFileTool;
pub use run_command::RunCommandTool;

use super::registry::ToolRegistry;
use super::ToolContext;

/// Create a registry with all default tools
pub fn create_default_registry(ctx: ToolContext) -> ToolRegistry {
    let mut registry = ToolRegistry::new(ctx);

    registry.register(ReadFileTool);
    registry.register(CalculateTool);
    registry.register(RunCommandTool);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolExecutor;

    #[test]
    fn test_default_registry_contents() {
        let registry = create_default_registry(ToolContext::default());
        assert_eq!(registry.list_names(), vec!["calculate", "read_file", "run_command"]);
        assert_eq!(registry.definitions().len(), 3);
    }

    #[tokio::test]
    async fn test_calculate_through_registry() {
        let registry = create_default_registry(ToolContext::default());
        let out = registry.execute("calculate", r#"{"expression": "2+3"}"#).await.unwrap();
        assert_eq!(out, "5");

        let err = registry.execute("calculate", r#"{"expression": "5/0"}"#).await.unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
    }
}
