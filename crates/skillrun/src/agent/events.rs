//! Events pushed from the agent loop to whoever drives the UI

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Lifecycle events of one invocation, in emission order
#[derive(Debug)]
pub enum AgentEvent {
    /// Final assistant text, summary block removed
    Text(String),
    /// The model asked for a tool
    ToolCall {
        id: String,
        name: String,
        args: String,
    },
    /// The loop is waiting for a decision on this call
    ToolConfirm {
        id: String,
        name: String,
        args: String,
        reply: ApprovalRequest,
    },
    /// The user declined the call
    ToolSkipped { id: String, name: String },
    /// Text handed back to the model for this call
    ToolResult {
        id: String,
        name: String,
        result: String,
    },
    /// The invocation finished and its state was persisted
    Done,
}

/// Single-use reply handle carried by [`AgentEvent::ToolConfirm`].
///
/// Dropping it without answering counts as a decline.
pub struct ApprovalRequest {
    tx: oneshot::Sender<bool>,
}

impl ApprovalRequest {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn approve(self) {
        self.respond(true);
    }

    pub fn decline(self) {
        self.respond(false);
    }

    pub fn respond(self, approved: bool) {
        // The loop may have been cancelled meanwhile
        if self.tx.send(approved).is_err() {
            debug!("Approval reply arrived after the request was abandoned");
        }
    }
}

impl fmt::Debug for ApprovalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalRequest")
            .field("pending", &!self.tx.is_closed())
            .finish()
    }
}

/// Sending half of the event channel.
///
/// A consumer that has gone away is not an error for the loop.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx }
    }

    pub async fn emit(&self, event: AgentEvent) {
        if let Err(e) = self.tx.send(event).await {
            debug!(event = ?e.0, "Event channel closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_approval_round_trip() {
        let (request, rx) = ApprovalRequest::channel();
        request.approve();
        assert_eq!(rx.await, Ok(true));

        let (request, rx) = ApprovalRequest::channel();
        request.decline();
        assert_eq!(rx.await, Ok(false));
    }

    #[tokio::test]
    async fn test_dropped_request_closes_receiver() {
        let (request, rx) = ApprovalRequest::channel();
        drop(request);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_emit_to_closed_channel_is_silent() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        EventEmitter::new(tx).emit(AgentEvent::Done).await;
    }

    #[tokio::test]
    async fn test_emit_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let emitter = EventEmitter::new(tx);
        emitter.emit(AgentEvent::Text("hi".to_string())).await;
        emitter.emit(AgentEvent::Done).await;

        assert!(matches!(rx.recv().await, Some(AgentEvent::Text(t)) if t == "hi"));
        assert!(matches!(rx.recv().await, Some(AgentEvent::Done)));
    }
}
