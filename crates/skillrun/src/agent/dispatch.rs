//! Tool dispatch with the human approval gate

use std::time::Duration;

use skillrun_core::Message;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::events::{AgentEvent, ApprovalRequest, EventEmitter};
use super::AgentError;
use crate::tools::ToolExecutor;

/// Result text for a declined call
pub const SKIPPED_RESULT: &str = "Tool execution skipped by user.";

/// What one dispatched call produced
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Text for the model's tool-role message
    pub result: String,
    /// Record for the invocation's tool log
    pub log_record: Message,
    pub skipped: bool,
}

/// Runs tool calls, asking for approval first unless auto-approved
pub struct Dispatcher<'a> {
    executor: &'a dyn ToolExecutor,
    events: &'a EventEmitter,
    cancel: &'a CancellationToken,
    auto_approve: bool,
    approval_timeout: Option<Duration>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        executor: &'a dyn ToolExecutor,
        events: &'a EventEmitter,
        cancel: &'a CancellationToken,
        auto_approve: bool,
    ) -> Self {
        Self {
            executor,
            events,
            cancel,
            auto_approve,
            approval_timeout: None,
        }
    }

    pub fn with_approval_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Dispatch one call. `name` is already normalized.
    ///
    /// Only cancellation is an error; tool failures become result text.
    #[instrument(skip_all, fields(tool = %name, id = %id))]
    pub async fn dispatch(
        &self,
        id: &str,
        name: &str,
        args: &str,
    ) -> Result<DispatchOutcome, AgentError> {
        self.events
            .emit(AgentEvent::ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                args: args.to_string(),
            })
            .await;

        if !self.auto_approve {
            let (reply, rx) = ApprovalRequest::channel();
            self.events
                .emit(AgentEvent::ToolConfirm {
                    id: id.to_string(),
                    name: name.to_string(),
                    args: args.to_string(),
                    reply,
                })
                .await;

            if !self.await_approval(rx).await? {
                info!("User declined tool execution");
                self.events
                    .emit(AgentEvent::ToolSkipped {
                        id: id.to_string(),
                        name: name.to_string(),
                    })
                    .await;
                self.emit_result(id, name, SKIPPED_RESULT).await;

                return Ok(DispatchOutcome {
                    result: SKIPPED_RESULT.to_string(),
                    log_record: Message::tool_result(
                        id,
                        format!("Tool '{}' execution skipped by user.", name),
                    ),
                    skipped: true,
                });
            }
            debug!("User approved tool execution");
        }

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
            r = self.executor.execute(name, args) => r,
        };
        let result = match result {
            Ok(output) => {
                debug!(output_len = output.len(), "Tool executed");
                output
            }
            Err(e) => {
                warn!(error = %e, "Tool execution error");
                format!("Error: {}", e)
            }
        };

        self.emit_result(id, name, &result).await;

        Ok(DispatchOutcome {
            log_record: Message::tool_result(
                id,
                format!("Tool '{}' executed with result: {}", name, result),
            ),
            result,
            skipped: false,
        })
    }

    /// Wait for the decision. A dropped request or an elapsed timeout is a decline.
    async fn await_approval(&self, rx: oneshot::Receiver<bool>) -> Result<bool, AgentError> {
        let decision = async {
            match self.approval_timeout {
                Some(limit) => match tokio::time::timeout(limit, rx).await {
                    Ok(reply) => reply.unwrap_or(false),
                    Err(_) => {
                        warn!(timeout_secs = limit.as_secs(), "Approval timed out, declining");
                        false
                    }
                },
                None => rx.await.unwrap_or(false),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            approved = decision => Ok(approved),
        }
    }

    async fn emit_result(&self, id: &str, name: &str, result: &str) {
        self.events
            .emit(AgentEvent::ToolResult {
                id: id.to_string(),
                name: name.to_string(),
                result: result.to_string(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use skillrun_core::ToolDefinition;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct CountingExecutor {
        calls: AtomicUsize,
        fail_with: Option<&'static str>,
    }

    impl CountingExecutor {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(msg: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: Some(msg),
            }
        }
    }

    #[async_trait]
    impl ToolExecutor for CountingExecutor {
        fn definitions(&self) -> Vec<ToolDefinition> {
            Vec::new()
        }

        async fn execute(&self, name: &str, _raw_args: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(msg) => anyhow::bail!("{}", msg),
                None => Ok(format!("ran {}", name)),
            }
        }
    }

    fn drain(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_auto_approve_runs_tool() {
        let executor = CountingExecutor::ok();
        let (tx, rx) = mpsc::channel(16);
        let emitter = EventEmitter::new(tx);
        let cancel = CancellationToken::new();

        let outcome = Dispatcher::new(&executor, &emitter, &cancel, true)
            .dispatch("c1", "calculate", "{}")
            .await
            .unwrap();

        assert_eq!(outcome.result, "ran calculate");
        assert!(!outcome.skipped);
        assert_eq!(
            outcome.log_record.content.as_deref(),
            Some("Tool 'calculate' executed with result: ran calculate")
        );

        let events = drain(rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], AgentEvent::ToolCall { name, .. } if name == "calculate"));
        assert!(matches!(
            &events[1],
            AgentEvent::ToolResult { result, .. } if result == "ran calculate"
        ));
    }

    #[tokio::test]
    async fn test_executor_error_becomes_text() {
        let executor = CountingExecutor::failing("file not found");
        let (tx, _rx) = mpsc::channel(16);
        let emitter = EventEmitter::new(tx);
        let cancel = CancellationToken::new();

        let outcome = Dispatcher::new(&executor, &emitter, &cancel, true)
            .dispatch("c1", "read_file", "{}")
            .await
            .unwrap();
        assert_eq!(outcome.result, "Error: file not found");
    }

    #[tokio::test]
    async fn test_decline_skips_executor() {
        let executor = CountingExecutor::ok();
        let (tx, mut rx) = mpsc::channel(16);
        let emitter = EventEmitter::new(tx);
        let cancel = CancellationToken::new();

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                match event {
                    AgentEvent::ToolConfirm { reply, .. } => {
                        seen.push("confirm");
                        reply.decline();
                    }
                    AgentEvent::ToolSkipped { .. } => seen.push("skipped"),
                    AgentEvent::ToolResult { result, .. } => {
                        assert_eq!(result, SKIPPED_RESULT);
                        seen.push("result");
                    }
                    AgentEvent::ToolCall { .. } => seen.push("call"),
                    _ => {}
                }
            }
            seen
        });

        let outcome = Dispatcher::new(&executor, &emitter, &cancel, false)
            .dispatch("c1", "run_command", r#"{"command":"rm -rf /"}"#)
            .await
            .unwrap();
        drop(emitter);

        assert!(outcome.skipped);
        assert_eq!(outcome.result, SKIPPED_RESULT);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(consumer.await.unwrap(), vec!["call", "confirm", "skipped", "result"]);
    }

    #[tokio::test]
    async fn test_dropped_acceptor_declines() {
        let executor = CountingExecutor::ok();
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let emitter = EventEmitter::new(tx);
        let cancel = CancellationToken::new();

        let outcome = Dispatcher::new(&executor, &emitter, &cancel, false)
            .dispatch("c1", "calculate", "{}")
            .await
            .unwrap();
        assert!(outcome.skipped);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_approval_timeout_declines() {
        let executor = CountingExecutor::ok();
        let (tx, _rx) = mpsc::channel(16);
        let emitter = EventEmitter::new(tx);
        let cancel = CancellationToken::new();

        let outcome = Dispatcher::new(&executor, &emitter, &cancel, false)
            .with_approval_timeout(Some(Duration::from_millis(20)))
            .dispatch("c1", "calculate", "{}")
            .await
            .unwrap();
        assert!(outcome.skipped);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let executor = CountingExecutor::ok();
        let (tx, _rx) = mpsc::channel(16);
        let emitter = EventEmitter::new(tx);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = Dispatcher::new(&executor, &emitter, &cancel, false)
            .dispatch("c1", "calculate", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}
