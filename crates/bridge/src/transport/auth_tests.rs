// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::body::to_bytes;
use axum::http::{HeaderMap, StatusCode};

use super::{authorize, bearer_token, query_token, TokenSource};

fn headers_with(value: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", value.parse().map_err(|e| anyhow::anyhow!("{e}"))?);
    Ok(headers)
}

#[test]
fn no_configured_token_allows_all() {
    assert!(authorize(None, None, TokenSource::Header).is_ok());
    assert!(authorize(None, Some("anything"), TokenSource::Query).is_ok());
}

#[yare::parameterized(
    canonical  = { "Bearer secret123", Some("secret123") },
    lowercase  = { "bearer secret123", Some("secret123") },
    padded     = { "Bearer  secret123 ", Some("secret123") },
    basic      = { "Basic dXNlcjpwYXNz", None },
    no_token   = { "Bearer ", None },
    no_scheme  = { "secret123", None },
)]
fn bearer_extraction(value: &str, expected: Option<&str>) {
    let headers = headers_with(value).unwrap_or_default();
    assert_eq!(bearer_token(&headers), expected);
}

#[test]
fn missing_header_has_no_token() {
    assert_eq!(bearer_token(&HeaderMap::new()), None);
}

#[yare::parameterized(
    only_token   = { Some("token=secret123"), Some("secret123") },
    among_others = { Some("x=1&token=secret123"), Some("secret123") },
    first_wins   = { Some("token=a&token=b"), Some("a") },
    other_key    = { Some("tokens=secret123"), None },
    empty        = { Some(""), None },
    absent       = { None, None },
)]
fn query_extraction(query: Option<&str>, expected: Option<&str>) {
    assert_eq!(query_token(query), expected);
}

#[yare::parameterized(
    wrong_token = { Some("wrong") },
    prefix_only = { Some("secret") },
    missing     = { None },
)]
fn mismatched_token_rejects(presented: Option<&str>) {
    let result = authorize(Some("secret123"), presented, TokenSource::Header);
    assert_eq!(result.map_err(|resp| resp.status()), Err(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn rejection_names_where_the_token_was_expected() -> anyhow::Result<()> {
    for (source, hint) in [
        (TokenSource::Header, "missing or invalid bearer token"),
        (TokenSource::Query, "missing or invalid token query parameter"),
    ] {
        let Err(resp) = authorize(Some("secret123"), Some("nope"), source) else {
            anyhow::bail!("{source:?} token was accepted");
        };
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await?)?;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert_eq!(body["error"]["message"], hint);
    }
    Ok(())
}
