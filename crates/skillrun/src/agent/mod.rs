//! Agent framework: the tool-calling execution loop
//!
//! One invocation sends the conversation to the model, runs whatever tools
//! it asks for (behind an approval gate), and repeats until the model
//! answers with text or the iteration limit is hit.

mod agent_loop;
pub mod conversation;
pub mod dispatch;
pub mod events;
pub mod select;
mod state;
pub mod summary;

pub use agent_loop::{AgentError, AgentLoop};
pub use events::{AgentEvent, ApprovalRequest};
pub use select::select_entry;
pub use state::AgentConfig;
