//! Best-effort routing of a request to a skill or an agent (model)

use skillrun_core::{AgentEntry, ChatBackend, Message};
use tracing::{debug, instrument, warn};

use crate::prompt;
use crate::skills::Skill;

/// Anything the selector can choose between
pub trait CatalogEntry {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
}

impl CatalogEntry for Skill {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl CatalogEntry for AgentEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

const NONE_ANSWER: &str = "NONE";

/// Ask the model which entry fits `user_input`.
///
/// `kind` names the catalog in the prompt ("skills", "agents"). Returns an
/// entry only on an exact name match; transport errors, empty answers and
/// `NONE` all yield `None`. Never retries.
#[instrument(skip(backend, entries, user_input), fields(candidates = entries.len()))]
pub async fn select_entry<'a, E: CatalogEntry>(
    backend: &dyn ChatBackend,
    kind: &str,
    entries: &'a [E],
    user_input: &str,
) -> Option<&'a E> {
    if entries.is_empty() {
        return None;
    }

    let listing: String = entries
        .iter()
        .map(|e| format!("- {}: {}\n", e.name(), e.description()))
        .collect();
    let messages = [
        Message::system(prompt::selector_prompt(kind)),
        Message::user(format!(
            "Available {}:\n{}\nUser request: {}",
            kind, listing, user_input
        )),
    ];

    let response = match backend.send(&messages, &[]).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Selector request failed");
            return None;
        }
    };

    let answer = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    let answer = clean_answer(&answer);
    debug!(answer, "Selector answered");

    if answer.is_empty() || answer == NONE_ANSWER {
        return None;
    }
    entries.iter().find(|e| e.name() == answer)
}

/// Strip whitespace and quoting noise around a one-word answer
fn clean_answer(answer: &str) -> &str {
    answer.trim().trim_matches(|c: char| matches!(c, '"' | '\'' | '`') || c.is_whitespace())
}
