// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::context::ContextType;

/// Configuration for the terminal bridge server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "termbridge", version, about = "Live agent terminal streaming bridge")]
pub struct BridgeConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "TERMBRIDGE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9810, env = "TERMBRIDGE_PORT")]
    pub port: u16,

    /// Bearer token for the HTTP API and `?token=` on WebSocket upgrades.
    /// If unset, auth is disabled.
    #[arg(long, env = "TERMBRIDGE_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Context types agents can run for.
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_value = "task,epic,project",
        env = "TERMBRIDGE_CONTEXTS"
    )]
    pub contexts: Vec<ContextType>,

    /// Events retained per agent source for slow viewers.
    #[arg(long, default_value_t = 1024, env = "TERMBRIDGE_EVENT_BUFFER")]
    pub event_buffer: usize,

    /// Outbound frames queued per viewer for registry broadcasts.
    #[arg(long, default_value_t = 256, env = "TERMBRIDGE_VIEWER_QUEUE")]
    pub viewer_queue: usize,

    /// Log format (json or text).
    #[arg(long, env = "TERMBRIDGE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TERMBRIDGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl BridgeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.contexts.is_empty() {
            anyhow::bail!("--contexts must name at least one context type");
        }
        if self.event_buffer == 0 {
            anyhow::bail!("--event-buffer must be greater than zero");
        }
        if self.viewer_queue == 0 {
            anyhow::bail!("--viewer-queue must be greater than zero");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build a minimal `BridgeConfig` for tests (port 0, every context type).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            auth_token: None,
            contexts: ContextType::ALL.to_vec(),
            event_buffer: 64,
            viewer_queue: 16,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
