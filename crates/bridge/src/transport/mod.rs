// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the terminal bridge.

pub mod auth;
pub mod http;
pub mod msg;
pub mod terminal;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::BridgeState;

/// Build the axum `Router` with all bridge routes.
pub fn build_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Introspection
        .route("/api/v1/contexts", get(http::list_contexts))
        .route("/api/v1/contexts/{kind}/{id}", get(http::get_context))
        // Agent ingest
        .route("/api/v1/agents/{kind}/{id}", post(http::attach_agent).delete(http::detach_agent))
        .route("/api/v1/agents/{kind}/{id}/output", post(http::agent_output))
        .route("/api/v1/agents/{kind}/{id}/exit", post(http::agent_exit))
        .route("/api/v1/agents/{kind}/{id}/input", get(http::agent_input))
        // Viewer WebSocket
        .route("/ws/terminal/{kind}/{id}", get(terminal::terminal_handler))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
