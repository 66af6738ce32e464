// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer WebSocket endpoint: `/ws/terminal/{contextType}/{contextId}`.
//!
//! Each connection registers with the [`ClientRegistry`](crate::registry::ClientRegistry),
//! binds to whichever agent source currently serves its context, and rebinds
//! when the lifecycle bus announces a new one. Everything it holds is released
//! when the loop exits, whatever the reason.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, RawQuery, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::context::ContextRef;
use crate::filter::filter_input;
use crate::lifecycle::LifecycleEvent;
use crate::runtime::AgentRuntime;
use crate::state::BridgeState;
use crate::subscription::Subscription;
use crate::transport::auth::{self, TokenSource};
use crate::transport::msg::{ClientMessage, ServerMessage};

/// Close code sent after the error frame for unsupported context types.
pub const CLOSE_UNSUPPORTED: u16 = 4003;

/// `GET /ws/terminal/{contextType}/{contextId}`
pub async fn terminal_handler(
    State(state): State<Arc<BridgeState>>,
    Path((kind, id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // Not a terminal path; leave it to whoever else serves `/ws/`.
    let Some(ctx) = ContextRef::from_segments(&kind, &id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let expected = state.config.auth_token.as_deref();
    let presented = auth::query_token(query.as_deref());
    if let Err(resp) = auth::authorize(expected, presented, TokenSource::Query) {
        return resp;
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    if !state.runtime.supports(ctx.kind) {
        tracing::info!(context = %ctx, "rejecting viewer for unsupported context type");
        return ws.on_upgrade(move |socket| reject_unsupported(socket, ctx)).into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(state, ctx, socket)).into_response()
}

/// Send one error frame, then close.
async fn reject_unsupported(mut socket: WebSocket, ctx: ContextRef) {
    let msg = ServerMessage::Error {
        message: format!("terminal streaming is not available for {} contexts", ctx.kind),
    };
    if send_json(&mut socket, &msg).await.is_err() {
        return;
    }
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_UNSUPPORTED,
            reason: "unsupported context".into(),
        })))
        .await;
}

/// Per-connection event loop.
async fn handle_connection(state: Arc<BridgeState>, ctx: ContextRef, socket: WebSocket) {
    let key = ctx.key();
    let runtime: &dyn AgentRuntime = state.runtime.as_ref();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (queue_tx, mut queue_rx) = mpsc::channel::<String>(state.config.viewer_queue);
    let mut registration = state.registry.register(key.clone(), queue_tx);

    // Listen before the initial lookup so a start racing it is not lost.
    let mut lifecycle_rx = state.lifecycle.subscribe();
    let mut subscription = Subscription::new();

    let running = match runtime.event_source(&ctx) {
        Some(source) => {
            subscription.bind(&source);
            source.is_running()
        }
        None => false,
    };
    tracing::debug!(context = %key, viewer = %registration.id(), running, "viewer connected");

    if send_json(&mut ws_tx, &ServerMessage::status(&ctx, running)).await.is_ok() {
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,

                event = lifecycle_rx.recv() => {
                    let source = match event {
                        Ok(LifecycleEvent::Started(started)) => {
                            if !started.target.matches(&ctx) {
                                continue;
                            }
                            started.source
                        }
                        Err(RecvError::Lagged(n)) => {
                            tracing::debug!(context = %key, lagged = n, "lifecycle listener lagged, resyncing");
                            match runtime.event_source(&ctx) {
                                Some(source) => source,
                                None => continue,
                            }
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if subscription.bind(&source) {
                        tracing::debug!(context = %key, source_id = %source.id(), "viewer rebound");
                    }
                    let msg = ServerMessage::status(&ctx, source.is_running());
                    if send_json(&mut ws_tx, &msg).await.is_err() {
                        break;
                    }
                }

                event = subscription.next_event() => {
                    let Some(event) = event else {
                        continue;
                    };
                    if send_json(&mut ws_tx, &ServerMessage::from(event)).await.is_err() {
                        break;
                    }
                }

                queued = queue_rx.recv() => {
                    let Some(text) = queued else {
                        break;
                    };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }

                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => handle_client_message(runtime, &ctx, text.as_str()),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(context = %key, err = %e, "viewer socket error");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    // Teardown: registry, source, then lifecycle listener.
    registration.release();
    subscription.unbind();
    drop(lifecycle_rx);
    tracing::debug!(context = %key, viewer = %registration.id(), "viewer disconnected");
}

/// Relay one viewer frame to the agent. Malformed frames and forwarding
/// failures are dropped.
fn handle_client_message(runtime: &dyn AgentRuntime, ctx: &ContextRef, text: &str) {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        return;
    };

    let result = match msg {
        ClientMessage::Input { data } => {
            let filtered = filter_input(&data);
            if filtered.is_empty() {
                return;
            }
            runtime.send_input(ctx, &filtered)
        }
        ClientMessage::Resize { cols, rows } => runtime.resize(ctx, cols, rows),
    };

    if let Err(code) = result {
        tracing::debug!(context = %ctx, err = %code, "viewer input not forwarded");
    }
}

/// Serialize and send a server message over the WebSocket.
async fn send_json<S>(tx: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
