// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Termbridge: live agent terminal streaming for task, epic and project viewers.

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod parse;
pub mod registry;
pub mod runtime;
pub mod source;
pub mod state;
pub mod subscription;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BridgeConfig;
use crate::state::BridgeState;
use crate::transport::build_router;

/// Run the bridge server until SIGINT/SIGTERM.
pub async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(config.addr()).await?;
    serve(listener, config, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    config: BridgeConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let contexts: Vec<&str> = config.contexts.iter().map(|c| c.as_str()).collect();
    let state = Arc::new(BridgeState::new(config.clone(), shutdown.clone())?);
    let router = build_router(state);

    info!(addr = %listener.local_addr()?, contexts = %contexts.join(","), "termbridge listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    info!("termbridge stopped");
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGTERM"),
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGINT"),
        }
        shutdown.cancel();
    });
}
