// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal WebSocket message types and conversions.

use serde::{Deserialize, Serialize};

use crate::context::{ContextRef, ContextType};
use crate::parse::FileAction;
use crate::source::AgentEvent;

/// Frames sent to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Status {
        running: bool,
        context_type: ContextType,
        context_id: u64,
    },
    Output {
        data: String,
    },
    #[serde(rename_all = "camelCase")]
    Exit {
        exit_code: Option<i32>,
    },
    Progress {
        progress: u8,
    },
    #[serde(rename_all = "camelCase")]
    FileChange {
        action: FileAction,
        file_path: String,
    },
    TestResult {
        passed: u32,
        failed: u32,
        total: u32,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn status(ctx: &ContextRef, running: bool) -> Self {
        Self::Status { running, context_type: ctx.kind, context_id: ctx.id }
    }
}

/// Frames accepted from viewers. Anything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

impl From<AgentEvent> for ServerMessage {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::Output { data } => Self::Output { data },
            AgentEvent::Exit { code } => Self::Exit { exit_code: code },
            AgentEvent::Progress { percent } => Self::Progress { progress: percent },
            AgentEvent::FileChange { action, path } => Self::FileChange { action, file_path: path },
            AgentEvent::TestResult { passed, failed, total } => {
                Self::TestResult { passed, failed, total }
            }
        }
    }
}

#[cfg(test)]
#[path = "msg_tests.rs"]
mod tests;
