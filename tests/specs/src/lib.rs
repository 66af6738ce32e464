// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `termbridge` binary as a subprocess and exercises it
//! over HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `termbridge` binary.
pub fn bridge_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("termbridge")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `termbridge` process that is killed on drop.
pub struct BridgeProcess {
    child: Child,
    port: u16,
    auth_token: Option<String>,
}

/// Builder for the flags a [`BridgeProcess`] is started with.
#[derive(Default)]
pub struct BridgeBuilder {
    auth_token: Option<String>,
    contexts: Option<String>,
    extra: Vec<String>,
}

impl BridgeBuilder {
    /// Require a bearer token (`--auth-token`).
    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    /// Restrict supported context types (`--contexts`).
    pub fn contexts(mut self, list: &str) -> Self {
        self.contexts = Some(list.to_owned());
        self
    }

    /// Pass an arbitrary extra flag.
    pub fn arg(mut self, arg: &str) -> Self {
        self.extra.push(arg.to_owned());
        self
    }

    pub fn spawn(self) -> anyhow::Result<BridgeProcess> {
        ensure_crypto();
        let binary = bridge_binary();
        anyhow::ensure!(binary.exists(), "termbridge binary not found at {}", binary.display());

        let port = free_port()?;
        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];
        if let Some(ref token) = self.auth_token {
            args.extend(["--auth-token".into(), token.clone()]);
        }
        if let Some(ref list) = self.contexts {
            args.extend(["--contexts".into(), list.clone()]);
        }
        args.extend(self.extra);

        let child = Command::new(&binary)
            .args(&args)
            .env_remove("TERMBRIDGE_AUTH_TOKEN")
            .env_remove("TERMBRIDGE_CONTEXTS")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(BridgeProcess { child, port, auth_token: self.auth_token })
    }
}

impl BridgeProcess {
    pub fn build() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    /// Spawn with default flags.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Viewer WebSocket URL for a context, with the token appended when set.
    pub fn terminal_url(&self, context_type: &str, context_id: u64) -> String {
        let base = format!("ws://127.0.0.1:{}/ws/terminal/{context_type}/{context_id}", self.port);
        match self.auth_token {
            Some(ref token) => format!("{base}?token={token}"),
            None => base,
        }
    }

    /// HTTP client request with the bearer token applied when set.
    pub fn request(
        &self,
        client: &reqwest::Client,
        method: reqwest::Method,
        path: &str,
    ) -> reqwest::RequestBuilder {
        let req = client.request(method, format!("{}{path}", self.base_url()));
        match self.auth_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("termbridge did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("termbridge did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
