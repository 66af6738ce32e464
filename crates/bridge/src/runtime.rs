// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runtime abstraction and the in-process implementation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{ContextRef, ContextType};
use crate::error::ErrorCode;
use crate::lifecycle::{LifecycleBus, StartedTarget};
use crate::parse::OutputParser;
use crate::source::{AgentCommand, AgentEventSource, AgentHandle};

/// What viewer connections need from whoever runs agent processes.
pub trait AgentRuntime: Send + Sync {
    /// Whether agents can run for this context type at all.
    fn supports(&self, kind: ContextType) -> bool;

    /// The source currently bound to `ctx`, if any.
    fn event_source(&self, ctx: &ContextRef) -> Option<Arc<AgentEventSource>>;

    fn is_running(&self, ctx: &ContextRef) -> bool {
        self.event_source(ctx).is_some_and(|s| s.is_running())
    }

    fn send_input(&self, ctx: &ContextRef, data: &str) -> Result<(), ErrorCode> {
        let source = self.event_source(ctx).ok_or(ErrorCode::AgentNotRunning)?;
        source.send_command(AgentCommand::Input { data: data.to_owned() })
    }

    fn resize(&self, ctx: &ContextRef, cols: u16, rows: u16) -> Result<(), ErrorCode> {
        let source = self.event_source(ctx).ok_or(ErrorCode::AgentNotRunning)?;
        source.send_command(AgentCommand::Resize { cols, rows })
    }
}

/// Runtime whose agents are fed by the embedding process through
/// [`AgentHandle`]s.
pub struct LocalRuntime {
    supported: BTreeSet<ContextType>,
    event_buffer: usize,
    parser: Arc<OutputParser>,
    lifecycle: Arc<LifecycleBus>,
    sources: Mutex<HashMap<ContextRef, Arc<AgentEventSource>>>,
}

impl LocalRuntime {
    pub fn new(
        supported: impl IntoIterator<Item = ContextType>,
        event_buffer: usize,
        lifecycle: Arc<LifecycleBus>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            supported: supported.into_iter().collect(),
            event_buffer,
            parser: Arc::new(OutputParser::new()?),
            lifecycle,
            sources: Mutex::new(HashMap::new()),
        })
    }

    /// Bind a fresh agent session to `ctx`, replacing any previous one, and
    /// announce it on the lifecycle bus.
    pub fn attach(&self, ctx: ContextRef) -> Result<AgentHandle, ErrorCode> {
        if !self.supports(ctx.kind) {
            return Err(ErrorCode::UnsupportedContext);
        }
        let handle = AgentHandle::new(ctx, self.event_buffer, Arc::clone(&self.parser));
        let source = Arc::clone(handle.source());

        let previous = self.sources.lock().insert(ctx, Arc::clone(&source));
        if let Some(prev) = previous {
            prev.mark_stopped();
            tracing::debug!(context = %ctx, old = %prev.id(), new = %source.id(), "agent replaced");
        }

        self.lifecycle.started(StartedTarget::Context(ctx), source);
        Ok(handle)
    }

    /// Remove the binding for `ctx`. Returns whether one existed.
    pub fn detach(&self, ctx: &ContextRef) -> bool {
        let removed = self.sources.lock().remove(ctx);
        match removed {
            Some(source) => {
                source.mark_stopped();
                tracing::debug!(context = %ctx, source_id = %source.id(), "agent detached");
                true
            }
            None => false,
        }
    }

    /// Contexts with a bound source, in key order.
    pub fn contexts(&self) -> Vec<ContextRef> {
        let mut out: Vec<_> = self.sources.lock().keys().copied().collect();
        out.sort_by_key(|c| c.key());
        out
    }

    pub fn supported(&self) -> impl Iterator<Item = ContextType> + '_ {
        self.supported.iter().copied()
    }
}

impl AgentRuntime for LocalRuntime {
    fn supports(&self, kind: ContextType) -> bool {
        self.supported.contains(&kind)
    }

    fn event_source(&self, ctx: &ContextRef) -> Option<Arc<AgentEventSource>> {
        self.sources.lock().get(ctx).cloned()
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
