//! Model input assembly

use chrono::{DateTime, Local};
use skillrun_core::Message;

/// Prefix every user turn and final reply with the wall-clock time
pub fn stamp(text: &str, now: DateTime<Local>) -> String {
    format!(
        "Current time: {}\n{}",
        now.format("%Y-%m-%dT%H:%M:%S %Z (UTC%:z)"),
        text
    )
}

/// The two message lists one invocation works on
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// What is sent to the model; grows with tool traffic
    pub input: Vec<Message>,
    /// Full durable history plus this turn; persisted at the end
    pub history: Vec<Message>,
}

impl Conversation {
    /// Record a message the model sees but that is never persisted
    pub fn push_transient(&mut self, message: Message) {
        self.input.push(message);
    }

    /// Record a message in both lists
    pub fn push_durable(&mut self, message: Message) {
        self.input.push(message.clone());
        self.history.push(message);
    }
}

/// Builds the initial [`Conversation`] for a turn.
///
/// Input order: system prompt, summary, the last `window` history entries,
/// then the timestamped user turn.
#[derive(Debug, Clone)]
pub struct ConversationBuilder {
    system_prompt: String,
    summary: Option<String>,
    history: Vec<Message>,
    window: usize,
}

impl ConversationBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            summary: None,
            history: Vec::new(),
            window: 4,
        }
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn build(self, user_input: &str, now: DateTime<Local>) -> Conversation {
        let turn = Message::user(stamp(user_input, now));

        let mut input = Vec::with_capacity(self.window + 3);
        input.push(Message::system(self.system_prompt));
        if let Some(summary) = self.summary {
            input.push(Message::system(summary));
        }
        let recent = self.history.len().saturating_sub(self.window);
        input.extend(self.history[recent..].iter().cloned());
        input.push(turn.clone());

        let mut history = self.history;
        history.push(turn);

        Conversation { input, history }
    }
}
