//! Model backend trait and the OpenAI-compatible chat client

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::chat::{ChatResponse, Message, ToolDefinition};
use crate::config::BackendConfig;

/// Failures talking to the model backend.
///
/// A response with zero choices is not an error here; callers decide what an
/// empty answer means.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Something that can answer a chat-completions request
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the conversation and the tool schemas, returning the raw response
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, BackendError>;

    /// Model identifier this backend talks to
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

/// Client for any OpenAI-compatible `/v1/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct CompatClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl CompatClient {
    /// Create a client; the model is fixed for the lifetime of the instance
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            client,
        })
    }

    /// Create a client from backend settings
    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Same endpoint and credentials, different model
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for CompatClient {
    #[instrument(
        skip(self, messages, tools),
        fields(model = %self.model, messages = messages.len())
    )]
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, BackendError> {
        let req = ChatRequest {
            model: &self.model,
            messages,
            tools,
        };

        let mut builder = self.client.post(self.chat_url()).json(&req);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        if let Some(ref err) = parsed.error {
            return Err(BackendError::Api(err.message.clone()));
        }

        debug!(choices = parsed.choices.len(), "Received chat response");
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
