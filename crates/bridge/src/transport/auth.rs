// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorCode;
use crate::state::BridgeState;

/// Where a viewer or client presents its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <token>` on the HTTP API.
    Header,
    /// `?token=<token>` on a WebSocket upgrade.
    Query,
}

impl TokenSource {
    fn hint(self) -> &'static str {
        match self {
            Self::Header => "missing or invalid bearer token",
            Self::Query => "missing or invalid token query parameter",
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Token from an `Authorization` header. The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

/// First `token=` value in a raw query string.
pub fn query_token(query: Option<&str>) -> Option<&str> {
    query?.split('&').find_map(|pair| pair.strip_prefix("token="))
}

/// Check a presented token against the configured one. No configured token
/// means auth is disabled.
pub fn authorize(
    expected: Option<&str>,
    presented: Option<&str>,
    source: TokenSource,
) -> Result<(), Response> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match presented {
        Some(token) if constant_time_eq(token, expected) => Ok(()),
        _ => {
            tracing::debug!(?source, "rejecting unauthenticated request");
            Err(ErrorCode::Unauthorized.to_http_response(source.hint()).into_response())
        }
    }
}

/// Axum middleware that enforces Bearer token authentication.
///
/// Exempt: `/api/v1/health` and WebSocket upgrades (`/ws/`), which check the
/// query token themselves.
pub async fn auth_layer(
    state: State<Arc<BridgeState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if path == "/api/v1/health" || path.starts_with("/ws/") {
        return next.run(req).await;
    }

    let expected = state.config.auth_token.as_deref();
    if let Err(resp) = authorize(expected, bearer_token(req.headers()), TokenSource::Header) {
        return resp;
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
