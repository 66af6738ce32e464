// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event sources: one per running agent process.
//!
//! An [`AgentEventSource`] is the consumer-facing side: viewers subscribe to
//! its broadcast channel and push commands into it. The matching
//! [`AgentHandle`] is the producer side held by whoever owns the process; it
//! also owns the session's [`ParserState`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::context::ContextRef;
use crate::error::ErrorCode;
use crate::parse::{estimate_progress, FileAction, OutputParser, ParserState, SemanticEvent};

/// Process-unique identity of an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{}", self.0)
    }
}

/// The event kinds forwarded to viewers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Output { data: String },
    Exit { code: Option<i32> },
    Progress { percent: u8 },
    FileChange { action: FileAction, path: String },
    TestResult { passed: u32, failed: u32, total: u32 },
}

/// Commands relayed from viewers to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentCommand {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

/// Consumer side of one running agent.
pub struct AgentEventSource {
    id: SourceId,
    context: ContextRef,
    events: broadcast::Sender<AgentEvent>,
    commands: mpsc::UnboundedSender<AgentCommand>,
    running: AtomicBool,
}

impl fmt::Debug for AgentEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentEventSource")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("running", &self.is_running())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl AgentEventSource {
    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn context(&self) -> ContextRef {
        self.context
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Number of live subscriptions to this source.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Relay a viewer command to the agent.
    pub fn send_command(&self, cmd: AgentCommand) -> Result<(), ErrorCode> {
        if !self.is_running() {
            return Err(ErrorCode::AgentNotRunning);
        }
        self.commands.send(cmd).map_err(|_| ErrorCode::AgentNotRunning)
    }
}

/// Producer side of one running agent.
pub struct AgentHandle {
    source: Arc<AgentEventSource>,
    commands: mpsc::UnboundedReceiver<AgentCommand>,
    parser: Arc<OutputParser>,
    state: ParserState,
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle").field("source", &self.source).finish()
    }
}

impl AgentHandle {
    /// Create a fresh source for `context` and its producer handle.
    pub fn new(context: ContextRef, capacity: usize, parser: Arc<OutputParser>) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let source = Arc::new(AgentEventSource {
            id: SourceId::next(),
            context,
            events,
            commands: commands_tx,
            running: AtomicBool::new(true),
        });
        Self { source, commands, parser, state: ParserState::new() }
    }

    pub fn source(&self) -> &Arc<AgentEventSource> {
        &self.source
    }

    pub fn parser_state(&self) -> &ParserState {
        &self.state
    }

    /// Forward a raw output chunk, then any signals derived from it.
    pub fn output(&mut self, chunk: &str) {
        self.emit(AgentEvent::Output { data: chunk.to_owned() });

        let mut explicit = false;
        for event in self.parser.parse(chunk, &mut self.state) {
            match event {
                SemanticEvent::Progress { value, .. } => {
                    explicit = true;
                    self.emit(AgentEvent::Progress { percent: value });
                }
                SemanticEvent::File { action, path } => {
                    self.emit(AgentEvent::FileChange { action, path });
                }
                SemanticEvent::Test { passed, failed, total } => {
                    self.emit(AgentEvent::TestResult { passed, failed, total });
                }
                SemanticEvent::Exit { code: 0 } => {
                    explicit = true;
                    self.emit(AgentEvent::Progress { percent: 100 });
                }
                SemanticEvent::Exit { code } => {
                    tracing::debug!(source_id = %self.source.id, code, "agent reported exit");
                }
                SemanticEvent::Error { message, severity } => {
                    tracing::debug!(
                        source_id = %self.source.id,
                        context = %self.source.context,
                        ?severity,
                        detail = %message,
                        "agent reported problem"
                    );
                }
            }
        }

        if !explicit {
            let estimate = estimate_progress(&self.state);
            if estimate > self.state.progress {
                self.state.progress = estimate;
                self.emit(AgentEvent::Progress { percent: estimate });
            }
        }
    }

    /// Report that the agent process terminated.
    pub fn exit(&mut self, code: Option<i32>) {
        self.source.mark_stopped();
        self.emit(AgentEvent::Exit { code });
    }

    pub fn progress(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.state.progress = percent;
        self.emit(AgentEvent::Progress { percent });
    }

    pub fn file_change(&mut self, action: FileAction, path: &str) {
        self.state.record_file(action, path);
        self.emit(AgentEvent::FileChange { action, path: path.to_owned() });
    }

    pub fn test_result(&mut self, passed: u32, failed: u32, total: u32) {
        self.state.tests_passed = passed;
        self.state.tests_failed = failed;
        self.state.tests_total = total;
        self.emit(AgentEvent::TestResult { passed, failed, total });
    }

    /// Pop a pending viewer command without waiting.
    pub fn try_next_command(&mut self) -> Option<AgentCommand> {
        self.commands.try_recv().ok()
    }

    /// Wait for the next viewer command.
    pub async fn next_command(&mut self) -> Option<AgentCommand> {
        self.commands.recv().await
    }

    fn emit(&self, event: AgentEvent) {
        // No subscribers is not an error: output still flows once a viewer binds.
        let _ = self.source.events.send(event);
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        self.source.mark_stopped();
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
