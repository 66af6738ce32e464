// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers: health, context introspection, and the agent ingest API.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::context::{ContextRef, ContextType};
use crate::error::ErrorCode;
use crate::runtime::AgentRuntime;
use crate::source::{AgentCommand, AgentHandle, SourceId};
use crate::state::BridgeState;
use crate::transport::msg::ServerMessage;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub contexts: usize,
    pub viewers: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    pub key: String,
    pub context_type: ContextType,
    pub context_id: u64,
    pub viewers: usize,
    pub running: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachResponse {
    pub source_id: SourceId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetachResponse {
    pub detached: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutputRequest {
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    #[serde(default)]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<BridgeState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        contexts: s.runtime.contexts().len(),
        viewers: s.registry.total(),
    })
}

/// `GET /api/v1/contexts`: every context with viewers or a bound agent.
pub async fn list_contexts(State(s): State<Arc<BridgeState>>) -> impl IntoResponse {
    let mut refs: BTreeMap<String, ContextRef> = BTreeMap::new();
    for ctx in s.runtime.contexts() {
        refs.insert(ctx.key().to_string(), ctx);
    }
    for key in s.registry.active_keys() {
        if let Some(ctx) = key.to_context() {
            refs.insert(key.to_string(), ctx);
        }
    }
    let infos: Vec<ContextInfo> = refs.values().map(|ctx| context_info(&s, ctx)).collect();
    Json(infos)
}

/// `GET /api/v1/contexts/{type}/{id}`
pub async fn get_context(
    State(s): State<Arc<BridgeState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    match ContextRef::from_segments(&kind, &id) {
        Some(ctx) => Json(context_info(&s, &ctx)).into_response(),
        None => ErrorCode::ContextNotFound
            .to_http_response(format!("no context {kind}/{id}"))
            .into_response(),
    }
}

/// `POST /api/v1/agents/{type}/{id}`: attach, or restart, an agent.
pub async fn attach_agent(
    State(s): State<Arc<BridgeState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let ctx = match agent_context(&s, &kind, &id) {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let handle = match s.runtime.attach(ctx) {
        Ok(h) => h,
        Err(code) => return code.to_http_response(format!("cannot attach to {ctx}")).into_response(),
    };
    let source_id = handle.source().id();
    s.agents.lock().insert(ctx, handle);
    tracing::info!(context = %ctx, %source_id, "agent attached");
    Json(AttachResponse { source_id }).into_response()
}

/// `DELETE /api/v1/agents/{type}/{id}`
pub async fn detach_agent(
    State(s): State<Arc<BridgeState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let ctx = match agent_context(&s, &kind, &id) {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let detached = s.runtime.detach(&ctx);
    let handle = s.agents.lock().remove(&ctx);
    if !detached && handle.is_none() {
        return not_running(&ctx);
    }

    let notified = s.registry.broadcast(&ctx.key(), &ServerMessage::status(&ctx, false));
    tracing::info!(context = %ctx, notified, "agent detached");
    Json(DetachResponse { detached: true }).into_response()
}

/// `POST /api/v1/agents/{type}/{id}/output`
pub async fn agent_output(
    State(s): State<Arc<BridgeState>>,
    Path((kind, id)): Path<(String, String)>,
    Json(req): Json<OutputRequest>,
) -> Response {
    with_agent(&s, &kind, &id, |handle| handle.output(&req.data))
}

/// `POST /api/v1/agents/{type}/{id}/exit`
pub async fn agent_exit(
    State(s): State<Arc<BridgeState>>,
    Path((kind, id)): Path<(String, String)>,
    Json(req): Json<ExitRequest>,
) -> Response {
    with_agent(&s, &kind, &id, |handle| handle.exit(req.exit_code))
}

/// `GET /api/v1/agents/{type}/{id}/input`: drain relayed viewer commands.
pub async fn agent_input(
    State(s): State<Arc<BridgeState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let ctx = match agent_context(&s, &kind, &id) {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let mut agents = s.agents.lock();
    let Some(handle) = agents.get_mut(&ctx) else {
        return not_running(&ctx);
    };
    let commands: Vec<AgentCommand> = std::iter::from_fn(|| handle.try_next_command()).collect();
    Json(commands).into_response()
}

// -- Helpers ------------------------------------------------------------------

fn context_info(s: &BridgeState, ctx: &ContextRef) -> ContextInfo {
    let key = ctx.key();
    ContextInfo {
        viewers: s.registry.count(&key),
        running: s.runtime.is_running(ctx),
        key: key.to_string(),
        context_type: ctx.kind,
        context_id: ctx.id,
    }
}

/// Parse and capability-check an agent route's context.
fn agent_context(s: &BridgeState, kind: &str, id: &str) -> Result<ContextRef, Response> {
    let ctx = ContextRef::from_segments(kind, id).ok_or_else(|| {
        ErrorCode::ContextNotFound.to_http_response(format!("no context {kind}/{id}")).into_response()
    })?;
    if !s.runtime.supports(ctx.kind) {
        return Err(ErrorCode::UnsupportedContext
            .to_http_response(format!("agents cannot run for {} contexts", ctx.kind))
            .into_response());
    }
    Ok(ctx)
}

fn with_agent(
    s: &BridgeState,
    kind: &str,
    id: &str,
    f: impl FnOnce(&mut AgentHandle),
) -> Response {
    let ctx = match agent_context(s, kind, id) {
        Ok(ctx) => ctx,
        Err(resp) => return resp,
    };
    let mut agents = s.agents.lock();
    match agents.get_mut(&ctx) {
        Some(handle) => {
            f(handle);
            Json(AcceptedResponse { accepted: true }).into_response()
        }
        None => not_running(&ctx),
    }
}

fn not_running(ctx: &ContextRef) -> Response {
    ErrorCode::AgentNotRunning.to_http_response(format!("no agent attached to {ctx}")).into_response()
}
