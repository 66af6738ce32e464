// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::context::ContextRef;
use crate::lifecycle::LifecycleBus;
use crate::registry::ClientRegistry;
use crate::runtime::LocalRuntime;
use crate::source::AgentHandle;

/// Shared bridge state, created once at server start.
pub struct BridgeState {
    pub config: BridgeConfig,
    pub runtime: Arc<LocalRuntime>,
    pub registry: Arc<ClientRegistry>,
    pub lifecycle: Arc<LifecycleBus>,
    /// Producer handles for agents fed through the HTTP ingest API.
    pub agents: Mutex<HashMap<ContextRef, AgentHandle>>,
    pub shutdown: CancellationToken,
}

impl BridgeState {
    pub fn new(config: BridgeConfig, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let lifecycle = Arc::new(LifecycleBus::default());
        let runtime = Arc::new(LocalRuntime::new(
            config.contexts.iter().copied(),
            config.event_buffer,
            Arc::clone(&lifecycle),
        )?);
        Ok(Self {
            config,
            runtime,
            registry: Arc::new(ClientRegistry::new()),
            lifecycle,
            agents: Mutex::new(HashMap::new()),
            shutdown,
        })
    }
}
