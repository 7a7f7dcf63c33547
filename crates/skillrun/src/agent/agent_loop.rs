//! Agent loop implementation

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use skillrun_core::{BackendError, ChatBackend, ChatResponse, Message, Reply, ToolDefinition};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::prompt;
use crate::session::SessionStore;
use crate::skills::Skill;
use crate::tools::{SuffixDelimiter, ToolExecutor, ToolNameNormalizer};

use super::conversation::{stamp, Conversation, ConversationBuilder};
use super::dispatch::Dispatcher;
use super::events::{AgentEvent, EventEmitter};
use super::state::AgentConfig;
use super::summary::extract_summary;

/// Why an invocation did not finish
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("exceeded max iterations ({0})")]
    MaxIterations(usize),

    #[error("cancelled")]
    Cancelled,

    #[error("no choices in response")]
    NoChoices,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("SKILL.md is empty: {}", .0.display())]
    EmptySkill(PathBuf),

    #[error("session error: {0:#}")]
    Session(anyhow::Error),
}

/// The agent loop orchestrator
pub struct AgentLoop {
    backend: Arc<dyn ChatBackend>,
    executor: Arc<dyn ToolExecutor>,
    store: SessionStore,
    config: AgentConfig,
    normalizer: Box<dyn ToolNameNormalizer>,
}

impl AgentLoop {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        executor: Arc<dyn ToolExecutor>,
        store: SessionStore,
        config: AgentConfig,
    ) -> Self {
        Self {
            backend,
            executor,
            store,
            config,
            normalizer: Box::new(SuffixDelimiter::default()),
        }
    }

    /// Replace the tool-name normalizer
    pub fn with_normalizer(mut self, normalizer: impl ToolNameNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run one user turn to completion.
    ///
    /// Emits events on `events` as it goes; `Done` is sent only after the
    /// session has been written.
    #[instrument(
        skip_all,
        fields(
            model = %self.backend.model(),
            skill = skill.map(|s| s.name.as_str()),
            auto_approve = auto_approve
        )
    )]
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        skill: Option<&Skill>,
        user_input: &str,
        events: &mpsc::Sender<AgentEvent>,
        auto_approve: bool,
    ) -> Result<(), AgentError> {
        if let Some(skill) = skill {
            if skill.content.trim().is_empty() {
                return Err(AgentError::EmptySkill(skill.path.join(crate::skills::SKILL_FILE)));
            }
        }

        let session = self.store.resolve().map_err(AgentError::Session)?;
        info!(
            session_id = %session.id,
            dir = %session.dir.display(),
            resumed = session.resumed,
            max_iterations = self.config.max_iterations,
            "Starting agent loop"
        );

        let tools = self.executor.definitions();
        let system_prompt = prompt::system_prompt(&self.config.working_dir, skill, &tools);
        let mut convo = ConversationBuilder::new(system_prompt)
            .with_summary(session.summary.as_ref().map(prompt::summary_prompt))
            .with_history(session.history)
            .with_window(self.config.history_window)
            .build(user_input, Local::now());

        let emitter = EventEmitter::new(events.clone());
        let dispatcher = Dispatcher::new(self.executor.as_ref(), &emitter, cancel, auto_approve)
            .with_approval_timeout(self.config.approval_timeout);
        let mut tool_log: Vec<Message> = Vec::new();
        let mut skipped = 0usize;

        for iteration in 0..self.config.max_iterations {
            if iteration > 0 && !self.config.iteration_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                    _ = tokio::time::sleep(self.config.iteration_delay) => {}
                }
            }
            debug!(iteration, messages = convo.input.len(), "Starting iteration");

            let response = self.send(cancel, &convo.input, &tools).await?;
            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or(AgentError::NoChoices)?;

            match choice.message.into_reply() {
                Reply::ToolCalls { content, calls } => {
                    debug!(tool_count = calls.len(), "Processing tool calls");
                    convo.push_transient(Message::assistant_tool_calls(content, calls.clone()));

                    for call in &calls {
                        let name = self.normalizer.normalize(&call.function.name);
                        let outcome = dispatcher
                            .dispatch(&call.id, name, &call.function.arguments)
                            .await?;
                        if outcome.skipped {
                            skipped += 1;
                        }
                        convo.push_transient(Message::tool_result(&call.id, outcome.result));
                        tool_log.push(outcome.log_record);
                    }
                    continue;
                }
                Reply::Text(raw) => {
                    let extracted = extract_summary(&raw);
                    if let Some(ref summary) = extracted.summary {
                        if let Err(e) = self.store.save_summary(&session.id, summary) {
                            warn!(error = %e, "Failed to save summary");
                        }
                    }

                    convo.push_durable(Message::assistant(stamp(&extracted.text, Local::now())));
                    if !extracted.text.is_empty() {
                        emitter.emit(AgentEvent::Text(extracted.text)).await;
                    }
                }
                Reply::Empty => debug!("Model returned an empty reply"),
            }

            self.persist(&session.id, &convo, &tool_log)?;
            info!(
                iterations = iteration + 1,
                tool_calls = tool_log.len(),
                skipped,
                "Agent completed task"
            );
            emitter.emit(AgentEvent::Done).await;
            return Ok(());
        }

        warn!(max_iterations = self.config.max_iterations, "Agent hit the iteration limit");
        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, AgentError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            response = self.backend.send(messages, tools) => response.map_err(|e| {
                warn!(error = %e, "Model request failed");
                AgentError::from(e)
            }),
        }
    }

    /// History is required; the tool log is best-effort
    fn persist(
        &self,
        session_id: &str,
        convo: &Conversation,
        tool_log: &[Message],
    ) -> Result<(), AgentError> {
        self.store
            .save_history(session_id, &convo.history)
            .map_err(AgentError::Session)?;

        if !tool_log.is_empty() {
            if let Err(e) = self.store.save_tool_log(session_id, tool_log) {
                warn!(error = %e, "Failed to save tool log");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("model", &self.backend.model())
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}
