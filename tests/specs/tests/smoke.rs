// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `termbridge` binary and
//! exercise the HTTP control API and the viewer WebSocket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Method;
use tokio_tungstenite::tungstenite::Message;

use termbridge_specs::BridgeProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn next_json(ws: &mut Ws) -> anyhow::Result<serde_json::Value> {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("websocket closed"))??;
        match msg {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            Message::Close(frame) => anyhow::bail!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

// -- HTTP ---------------------------------------------------------------------

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let bridge = BridgeProcess::start()?;
    bridge.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", bridge.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert_eq!(resp["contexts"], 0);
    assert_eq!(resp["viewers"], 0);
    Ok(())
}

#[tokio::test]
async fn http_auth_required_when_token_set() -> anyhow::Result<()> {
    let bridge = BridgeProcess::build().auth_token("smoke-token").spawn()?;
    bridge.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let resp = client.get(format!("{}/api/v1/contexts", bridge.base_url())).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let resp = bridge.request(&client, Method::GET, "/api/v1/contexts").send().await?;
    assert!(resp.status().is_success());
    Ok(())
}

#[tokio::test]
async fn http_input_drain() -> anyhow::Result<()> {
    let bridge = BridgeProcess::start()?;
    bridge.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let resp = bridge.request(&client, Method::POST, "/api/v1/agents/task/11").send().await?;
    assert!(resp.status().is_success());

    let (mut ws, _) = tokio_tungstenite::connect_async(bridge.terminal_url("task", 11)).await?;
    let status = next_json(&mut ws).await?;
    assert_eq!(status["type"], "status");
    assert_eq!(status["running"], true);

    ws.send(Message::Text(r#"{"type":"input","data":"echo hi\r"}"#.into())).await?;
    ws.send(Message::Text(r#"{"type":"resize","cols":120,"rows":40}"#.into())).await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let mut drained: Vec<serde_json::Value> = Vec::new();
    while drained.len() < 2 {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("relayed commands never drained: {drained:?}");
        }
        let batch: Vec<serde_json::Value> = bridge
            .request(&client, Method::GET, "/api/v1/agents/task/11/input")
            .send()
            .await?
            .json()
            .await?;
        drained.extend(batch);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(drained[0], serde_json::json!({ "type": "input", "data": "echo hi\r" }));
    assert_eq!(drained[1], serde_json::json!({ "type": "resize", "cols": 120, "rows": 40 }));
    Ok(())
}

// -- WebSocket ----------------------------------------------------------------

#[tokio::test]
async fn ws_viewer_receives_agent_output() -> anyhow::Result<()> {
    let bridge = BridgeProcess::start()?;
    bridge.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let (mut ws, _) = tokio_tungstenite::connect_async(bridge.terminal_url("epic", 3)).await?;
    let status = next_json(&mut ws).await?;
    assert_eq!(status["type"], "status");
    assert_eq!(status["running"], false);
    assert_eq!(status["contextType"], "epic");
    assert_eq!(status["contextId"], 3);

    let resp = bridge.request(&client, Method::POST, "/api/v1/agents/epic/3").send().await?;
    assert!(resp.status().is_success());

    let status = next_json(&mut ws).await?;
    assert_eq!(status["type"], "status");
    assert_eq!(status["running"], true);

    let resp = bridge
        .request(&client, Method::POST, "/api/v1/agents/epic/3/output")
        .json(&serde_json::json!({ "data": "smoke-marker\n" }))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let output = next_json(&mut ws).await?;
    assert_eq!(output["type"], "output");
    assert_eq!(output["data"], "smoke-marker\n");

    let resp = bridge
        .request(&client, Method::POST, "/api/v1/agents/epic/3/exit")
        .json(&serde_json::json!({ "exitCode": 0 }))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let exit = next_json(&mut ws).await?;
    assert_eq!(exit["type"], "exit");
    assert_eq!(exit["exitCode"], 0);
    Ok(())
}

#[tokio::test]
async fn ws_unsupported_context_closes() -> anyhow::Result<()> {
    let bridge = BridgeProcess::build().contexts("task").spawn()?;
    bridge.wait_healthy(TIMEOUT).await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(bridge.terminal_url("project", 1)).await?;

    let error = next_json(&mut ws).await?;
    assert_eq!(error["type"], "error");

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("no close frame received");
        }
        match tokio::time::timeout(TIMEOUT, ws.next()).await? {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 4003);
                return Ok(());
            }
            Some(Ok(Message::Close(None))) | None => anyhow::bail!("closed without code"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

// -- Process ------------------------------------------------------------------

#[tokio::test]
async fn invalid_config_exits_with_code_2() -> anyhow::Result<()> {
    let mut bridge = BridgeProcess::build().arg("--event-buffer").arg("0").spawn()?;
    let status = bridge.wait_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(2));
    Ok(())
}
