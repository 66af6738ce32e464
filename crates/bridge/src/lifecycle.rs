// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide agent lifecycle notifications.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::context::{ContextRef, ContextType};
use crate::source::AgentEventSource;

/// Which context a started agent serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartedTarget {
    /// Fully-qualified context.
    Context(ContextRef),
    /// Older producers only report a task id.
    Task(u64),
}

impl StartedTarget {
    pub fn matches(&self, ctx: &ContextRef) -> bool {
        match self {
            Self::Context(target) => target == ctx,
            Self::Task(id) => ctx.kind == ContextType::Task && ctx.id == *id,
        }
    }
}

/// An agent process attached to a context.
#[derive(Debug, Clone)]
pub struct AgentStarted {
    pub target: StartedTarget,
    pub source: Arc<AgentEventSource>,
}

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Started(AgentStarted),
}

/// Fan-out point for [`LifecycleEvent`]s. Each viewer connection holds one
/// receiver for its whole lifetime.
pub struct LifecycleBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub fn started(&self, target: StartedTarget, source: Arc<AgentEventSource>) {
        tracing::debug!(?target, source_id = %source.id(), "agent started");
        let _ = self.tx.send(LifecycleEvent::Started(AgentStarted { target, source }));
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
