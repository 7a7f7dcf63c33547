//! skillrun-core: Shared library for the skillrun agent
//!
//! Provides:
//! - Chat message and tool-call types (OpenAI wire shape)
//! - Model backend trait and an OpenAI-compatible client
//! - Configuration loading (config.toml + environment)

pub mod chat;
pub mod client;
pub mod config;

pub use chat::{
    ChatResponse, Choice, FunctionCall, FunctionDefinition, Message, Reply, Role,
    ToolCallRequest, ToolDefinition,
};
pub use client::{BackendError, ChatBackend, CompatClient};
pub use config::{AgentEntry, AgentSettings, BackendConfig, Config, PathsConfig};
