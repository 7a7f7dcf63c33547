//! Prompt text sent to the model

use std::path::Path;

use serde_json::Value;
use skillrun_core::ToolDefinition;

use crate::agent::summary::{SUMMARY_END, SUMMARY_START};
use crate::skills::Skill;

fn summary_instructions() -> String {
    format!(
        r#"## Conversation Summary
At the end of every final answer, append a JSON summary of the conversation so far,
wrapped in markers exactly like this:

{SUMMARY_START}
{{"topic": "...", "facts": ["..."], "open_items": ["..."]}}
{SUMMARY_END}

Merge anything from the previous summary that still matters. The block is stored
and removed before the user sees your answer."#
    )
}

/// System prompt for a run, with or without a skill
pub fn system_prompt(
    working_dir: &Path,
    skill: Option<&Skill>,
    tools: &[ToolDefinition],
) -> String {
    let mut prompt = String::new();

    match skill {
        Some(skill) => {
            prompt.push_str(&format!(
                "You are an AI assistant running the \"{}\" skill. Follow the skill instructions below, using tools where they help.\n\n",
                skill.name
            ));
            prompt.push_str(&format!("Working directory: {}\n", working_dir.display()));
            prompt.push_str(&format!("Skill directory: {}\n\n", skill.path.display()));
            prompt.push_str("## Skill Instructions\n");
            prompt.push_str(&skill.resolved_content());
            prompt.push_str("\n\n");
        }
        None => {
            prompt.push_str("You are an AI assistant with access to tools for completing tasks.\n\n");
            prompt.push_str(&format!("Working directory: {}\n\n", working_dir.display()));
        }
    }

    if !tools.is_empty() {
        prompt.push_str("## Available Tools\n");
        prompt.push_str(&format_tool_list(tools));
        prompt.push_str("\n\n");
    }

    prompt.push_str(
        r#"## Guidelines
- Use tools to gather information before responding
- A tool call may be declined by the user; do not retry a declined call unchanged
- Each user message starts with the current time
- Be concise but thorough

When you have completed the task, give the final answer without calling any more tools.

"#,
    );
    prompt.push_str(&summary_instructions());

    prompt
}

/// System message carrying the summary saved by an earlier run
pub fn summary_prompt(summary: &Value) -> String {
    let rendered = serde_json::to_string_pretty(summary).unwrap_or_else(|_| summary.to_string());
    format!(
        "Summary of the conversation so far. Carry it forward in your next summary block.\n{}",
        rendered
    )
}

/// System prompt for picking one entry out of a catalog
pub fn selector_prompt(kind: &str) -> String {
    format!(
        r#"You route user requests. Given a list of available {kind} and a user request,
answer with the name of the single best matching entry, exactly as listed.
If nothing fits, answer NONE.
Answer with the name or NONE only: no punctuation, no explanation."#
    )
}

fn format_tool_list(tools: &[ToolDefinition]) -> String {
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.function.name, t.function.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_generic_prompt() {
        let tools = vec![ToolDefinition::new("calculate", "Evaluate math", json!({}))];
        let prompt = system_prompt(Path::new("/work"), None, &tools);
        assert!(prompt.contains("Working directory: /work"));
        assert!(prompt.contains("- calculate: Evaluate math"));
        assert!(prompt.contains(SUMMARY_START));
        assert!(prompt.contains(SUMMARY_END));
    }

    #[test]
    fn test_skill_prompt_includes_body() {
        let skill = Skill {
            name: "review".to_string(),
            description: "Code review".to_string(),
            path: PathBuf::from("/skills/review"),
            content: "Check every changed line.".to_string(),
        };
        let prompt = system_prompt(Path::new("/work"), Some(&skill), &[]);
        assert!(prompt.contains("\"review\" skill"));
        assert!(prompt.contains("Skill directory: /skills/review"));
        assert!(prompt.contains("Check every changed line."));
        assert!(!prompt.contains("## Available Tools"));
    }

    #[test]
    fn test_summary_prompt_embeds_json() {
        let prompt = summary_prompt(&json!({"topic": "taxes"}));
        assert!(prompt.contains("\"topic\": \"taxes\""));
    }

    #[test]
    fn test_selector_prompt_names_kind() {
        assert!(selector_prompt("skills").contains("available skills"));
    }
}
