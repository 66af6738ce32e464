// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection binding to the current agent event source.
//!
//! A connection is either unbound or bound to exactly one source. Rebinding
//! drops the old receiver before subscribing to the new source, so events from
//! a replaced source can never interleave with the current one.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::source::{AgentEvent, AgentEventSource, SourceId};

#[derive(Debug, Default)]
pub enum Subscription {
    #[default]
    Unbound,
    Bound { source_id: SourceId, rx: broadcast::Receiver<AgentEvent> },
}

impl Subscription {
    pub fn new() -> Self {
        Self::Unbound
    }

    /// Bind to `source`. Returns `false` when already bound to it.
    pub fn bind(&mut self, source: &AgentEventSource) -> bool {
        if self.source_id() == Some(source.id()) {
            return false;
        }
        // Release the previous receiver before the new one exists.
        self.unbind();
        *self = Self::Bound { source_id: source.id(), rx: source.subscribe() };
        true
    }

    /// Drop the current binding, if any. Returns whether one was dropped.
    pub fn unbind(&mut self) -> bool {
        !matches!(std::mem::take(self), Self::Unbound)
    }

    pub fn source_id(&self) -> Option<SourceId> {
        match self {
            Self::Unbound => None,
            Self::Bound { source_id, .. } => Some(*source_id),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound { .. })
    }

    /// Next event from the bound source.
    ///
    /// Pends forever while unbound, so it can sit in a `select!` next to the
    /// lifecycle receiver. Returns `None` once the bound source has closed;
    /// the subscription is unbound at that point.
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        loop {
            let (source_id, result) = match self {
                Self::Unbound => return std::future::pending().await,
                Self::Bound { source_id, rx } => (*source_id, rx.recv().await),
            };
            match result {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!(%source_id, skipped = n, "subscription lagged");
                }
                Err(RecvError::Closed) => {
                    tracing::debug!(%source_id, "source closed");
                    *self = Self::Unbound;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
