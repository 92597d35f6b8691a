// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a mock token endpoint, recording fakes for the
//! agent and the message sink, and a fully wired bridge over a data directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::agent::AgentService;
use crate::config::BridgeConfig;
use crate::credential::{Credential, SCOPES};
use crate::identity::{Identity, ThreadKey};
use crate::messaging::MessageSink;
use crate::state::AppState;

/// Assert that `$expr` is an `Err` whose message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

static CRYPTO: Once = Once::new();

/// Install the rustls crypto provider. reqwest needs it even for plain HTTP.
pub fn install_crypto_provider() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// OAuth token endpoint on `127.0.0.1` that replays canned responses.
///
/// Once the script runs out the last response repeats.
pub struct MockTokenServer {
    addr: SocketAddr,
    calls: Arc<AtomicU32>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTokenServer {
    pub async fn start(responses: Vec<(u16, String)>) -> anyhow::Result<Self> {
        install_crypto_provider();
        let calls = Arc::new(AtomicU32::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(responses);

        let app = Router::new().route(
            "/token",
            post({
                let calls = Arc::clone(&calls);
                let requests = Arc::clone(&requests);
                move |body: String| {
                    let calls = Arc::clone(&calls);
                    let requests = Arc::clone(&requests);
                    let responses = Arc::clone(&responses);
                    async move {
                        let idx = calls.fetch_add(1, Ordering::Relaxed) as usize;
                        requests.lock().await.push(body);
                        let (status, body) = responses
                            .get(idx)
                            .or_else(|| responses.last())
                            .cloned()
                            .unwrap_or((500, "{}".to_owned()));
                        (
                            StatusCode::from_u16(status)
                                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                            body,
                        )
                    }
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { addr, calls, requests })
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Raw form bodies received so far.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

/// JSON body of a successful token response.
pub fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> String {
    let mut body = serde_json::json!({
        "access_token": access,
        "expires_in": expires_in,
        "token_type": "Bearer",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::from(refresh);
    }
    body.to_string()
}

/// Credential with token `access-token` and refresh token `refresh-token`,
/// expiring an hour from now, or an hour ago when `expired`.
pub fn sample_credential(token_uri: &str, expired: bool) -> Credential {
    let offset = chrono::Duration::hours(1);
    Credential {
        token: "access-token".to_owned(),
        refresh_token: Some("refresh-token".to_owned()),
        token_uri: token_uri.to_owned(),
        client_id: "client-id".to_owned(),
        client_secret: "client-secret".to_owned(),
        scopes: SCOPES.iter().map(|s| (*s).to_owned()).collect(),
        expiry: Some(if expired { Utc::now() - offset } else { Utc::now() + offset }),
    }
}

/// Message sink that records every send.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail after recording them.
    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    /// `(identity, body)` pairs in send order.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, to: &Identity, body: &str) -> anyhow::Result<()> {
        self.sent.lock().await.push((to.as_str().to_owned(), body.to_owned()));
        if self.fail.load(Ordering::Relaxed) {
            anyhow::bail!("sink unavailable");
        }
        Ok(())
    }
}

/// Agent that answers `reply to: <message>` and records its inputs.
#[derive(Default)]
pub struct ScriptedAgent {
    calls: Mutex<Vec<(String, String)>>,
    pub started: AtomicBool,
    pub stopped: AtomicBool,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(message, thread)` pairs in call order.
    pub async fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AgentService for ScriptedAgent {
    async fn start(&self) -> anyhow::Result<()> {
        self.started.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    async fn process(&self, message: &str, thread: &ThreadKey) -> String {
        self.calls.lock().await.push((message.to_owned(), thread.as_str().to_owned()));
        format!("reply to: {message}")
    }
}

/// A fully wired bridge rooted at a caller-owned directory, with fakes for
/// the agent and the sink and the OAuth token endpoint at `token_url`.
pub struct TestBridge {
    pub config: BridgeConfig,
    pub agent: Arc<ScriptedAgent>,
    pub sink: Arc<RecordingSink>,
    pub state: Arc<AppState>,
}

impl TestBridge {
    pub fn new(root: &Path, token_url: &str) -> anyhow::Result<Self> {
        Self::with_args(root, token_url, &[])
    }

    /// Like [`TestBridge::new`] with extra command-line flags.
    pub fn with_args(root: &Path, token_url: &str, extra: &[&str]) -> anyhow::Result<Self> {
        let data_dir = root.join("data");
        let sidecar = root.join("home").join(".gmail-mcp").join("credentials.json");
        let data_dir = data_dir.to_string_lossy().into_owned();
        let sidecar = sidecar.to_string_lossy().into_owned();

        let mut args = vec![
            "chatdrive",
            "--public-url",
            "http://bridge.test",
            "--data-dir",
            data_dir.as_str(),
            "--sidecar-path",
            sidecar.as_str(),
            "--google-client-id",
            "client-id",
            "--google-client-secret",
            "client-secret",
            "--google-auth-uri",
            "https://accounts.test/o/oauth2/auth",
            "--google-token-uri",
            token_url,
        ];
        args.extend_from_slice(extra);
        install_crypto_provider();
        let config = BridgeConfig::try_parse_from(args)?;

        let agent = Arc::new(ScriptedAgent::new());
        let sink = Arc::new(RecordingSink::new());
        let state = Arc::new(AppState::new(
            config.clone(),
            Arc::clone(&agent) as Arc<dyn AgentService>,
            Arc::clone(&sink) as Arc<dyn MessageSink>,
        )?);
        Ok(Self { config, agent, sink, state })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config.data_dir.clone()
    }

    /// Store a credential and mark `identity` as the active user.
    pub fn seed_session(&self, identity: &str, cred: &Credential) -> anyhow::Result<Identity> {
        let id = Identity::parse(identity).ok_or_else(|| anyhow::anyhow!("blank identity"))?;
        self.state.store.save(&id, cred)?;
        self.state.registry.set_active(&id)?;
        Ok(id)
    }
}
