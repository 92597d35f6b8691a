// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the bridge HTTP API.
//!
//! Uses `axum_test::TestServer` against the full router, with the OAuth
//! token endpoint mocked on a local port.

use std::collections::BTreeMap;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::Value;

use chatdrive::auth::PendingRequest;
use chatdrive::identity::{Identity, ThreadKey};
use chatdrive::messaging::twilio::{expected_signature, SIGNATURE_HEADER};
use chatdrive::router::CONSENT_PROMPT;
use chatdrive::test_support::{sample_credential, token_body, MockTokenServer, TestBridge};
use chatdrive::transport::build_router;

const UNUSED_TOKEN_URL: &str = "http://127.0.0.1:9/token";

fn test_server(bridge: &TestBridge) -> anyhow::Result<TestServer> {
    TestServer::new(build_router(bridge.state.clone())).map_err(|e| anyhow::anyhow!("{e}"))
}

fn identity(raw: &str) -> anyhow::Result<Identity> {
    Identity::parse(raw).ok_or_else(|| anyhow::anyhow!("blank identity"))
}

#[tokio::test]
async fn health_reports_healthy() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::new(dir.path(), UNUSED_TOKEN_URL)?;
    let server = test_server(&bridge)?;

    let resp = server.get("/api/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "healthy");
    let ts = body["timestamp"].as_str().unwrap_or_default();
    chrono::DateTime::parse_from_rfc3339(ts)?;
    Ok(())
}

#[tokio::test]
async fn webhook_from_unknown_sender_sends_consent_link() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::new(dir.path(), UNUSED_TOKEN_URL)?;
    let server = test_server(&bridge)?;

    let resp = server
        .post("/api/webhook")
        .form(&[("From", "whatsapp:+12345"), ("Body", "hello")])
        .await;
    resp.assert_status_ok();
    assert!(resp.text().is_empty());

    let sent = bridge.sink.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "12345");
    assert!(sent[0].1.starts_with(CONSENT_PROMPT));
    assert!(sent[0].1.contains("http://bridge.test/api/auth/redirect?user_number=12345&msg=hello"));
    assert!(bridge.agent.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn webhook_from_active_sender_is_answered() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tokens = MockTokenServer::start(vec![(500, "{}".to_owned())]).await?;
    let bridge = TestBridge::new(dir.path(), &tokens.token_url())?;
    let sender = bridge.seed_session("123", &sample_credential(&tokens.token_url(), false))?;
    let server = test_server(&bridge)?;

    server
        .post("/api/webhook")
        .form(&[("From", "whatsapp:+123"), ("Body", "list my files")])
        .await
        .assert_status_ok();

    assert_eq!(
        bridge.agent.calls().await,
        vec![("list my files".to_owned(), ThreadKey::today(&sender).as_str().to_owned())]
    );
    assert_eq!(bridge.sink.sent().await, vec![("123".to_owned(), "reply to: list my files".to_owned())]);
    assert_eq!(tokens.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn webhook_passes_body_through_unchanged() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tokens = MockTokenServer::start(vec![(500, "{}".to_owned())]).await?;
    let bridge = TestBridge::new(dir.path(), &tokens.token_url())?;
    let sender = bridge.seed_session("123", &sample_credential(&tokens.token_url(), false))?;
    let server = test_server(&bridge)?;

    server
        .post("/api/webhook")
        .form(&[("From", "whatsapp:+123"), ("Body", "  show  my files\n")])
        .await
        .assert_status_ok();

    assert_eq!(
        bridge.agent.calls().await,
        vec![("  show  my files\n".to_owned(), ThreadKey::today(&sender).as_str().to_owned())]
    );
    Ok(())
}

#[tokio::test]
async fn webhook_requires_sender_and_body() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::new(dir.path(), UNUSED_TOKEN_URL)?;
    let server = test_server(&bridge)?;

    for form in [
        vec![("From", "whatsapp:+1")],
        vec![("Body", "hi")],
        vec![("From", " "), ("Body", "hi")],
        vec![("From", "whatsapp:+1"), ("Body", " \n ")],
    ] {
        let resp = server.post("/api/webhook").form(&form).await;
        resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
    assert!(bridge.sink.sent().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn webhook_still_acknowledges_when_sink_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::new(dir.path(), UNUSED_TOKEN_URL)?;
    bridge.sink.fail_sends();
    let server = test_server(&bridge)?;

    server
        .post("/api/webhook")
        .form(&[("From", "whatsapp:+1"), ("Body", "hi")])
        .await
        .assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn webhook_signature_is_checked_when_configured() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let webhook_url = "https://bridge.test/api/webhook";
    let bridge = TestBridge::with_args(
        dir.path(),
        UNUSED_TOKEN_URL,
        &["--twilio-auth-token", "twilio-secret", "--twilio-webhook-url", webhook_url],
    )?;
    let server = test_server(&bridge)?;
    let form = [("From", "whatsapp:+12345"), ("Body", "hello")];

    server.post("/api/webhook").form(&form).await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/api/webhook")
        .add_header(HeaderName::from_static(SIGNATURE_HEADER), HeaderValue::from_static("bm9wZQ=="))
        .form(&form)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    assert!(bridge.sink.sent().await.is_empty());

    let params: BTreeMap<String, String> =
        form.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    let signature = HeaderValue::from_str(&expected_signature("twilio-secret", webhook_url, &params))?;
    server
        .post("/api/webhook")
        .add_header(HeaderName::from_static(SIGNATURE_HEADER), signature)
        .form(&form)
        .await
        .assert_status_ok();
    assert_eq!(bridge.sink.sent().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn redirect_sends_browser_to_consent_page() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::new(dir.path(), UNUSED_TOKEN_URL)?;
    let server = test_server(&bridge)?;

    let resp = server
        .get("/api/auth/redirect")
        .add_query_param("user_number", "12345")
        .add_query_param("msg", "hello")
        .await;
    resp.assert_status(StatusCode::SEE_OTHER);
    let location = url::Url::parse(resp.header(header::LOCATION).to_str()?)?;
    assert_eq!(location.host_str(), Some("accounts.test"));

    let query: BTreeMap<String, String> = location.query_pairs().into_owned().collect();
    assert_eq!(query.get("client_id").map(String::as_str), Some("client-id"));
    assert_eq!(
        query.get("redirect_uri").map(String::as_str),
        Some("http://bridge.test/api/auth/callback")
    );
    let state = query.get("state").ok_or_else(|| anyhow::anyhow!("no state"))?;
    let pending = PendingRequest::decode(state)?;
    assert_eq!(pending.user_number, "12345");
    assert_eq!(pending.msg, "hello");
    Ok(())
}

#[tokio::test]
async fn redirect_without_user_number_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::new(dir.path(), UNUSED_TOKEN_URL)?;
    let server = test_server(&bridge)?;

    server.get("/api/auth/redirect").await.assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/auth/redirect")
        .add_query_param("user_number", "whatsapp:+")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn callback_completes_consent_and_answers_parked_message() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tokens =
        MockTokenServer::start(vec![(200, token_body("fresh-access", Some("fresh-refresh"), 3600))])
            .await?;
    let bridge = TestBridge::new(dir.path(), &tokens.token_url())?;
    let server = test_server(&bridge)?;
    let sender = identity("123")?;
    let state = PendingRequest::new(&sender, "hi").encode();

    let resp = server
        .get("/api/auth/callback")
        .add_query_param("code", "auth-code")
        .add_query_param("state", &state)
        .await;
    resp.assert_status_ok();
    assert!(resp.text().contains("You're authenticated"));

    assert_eq!(tokens.calls(), 1);
    assert!(bridge.state.store.exists());
    assert!(bridge.state.registry.is_active(&sender));
    assert_eq!(bridge.state.store.load(&sender)?.token, "fresh-access");
    assert_eq!(
        bridge.agent.calls().await,
        vec![("hi".to_owned(), ThreadKey::today(&sender).as_str().to_owned())]
    );
    assert_eq!(bridge.sink.sent().await, vec![("123".to_owned(), "reply to: hi".to_owned())]);

    // The next message goes straight through.
    server
        .post("/api/webhook")
        .form(&[("From", "whatsapp:+123"), ("Body", "again")])
        .await
        .assert_status_ok();
    assert_eq!(bridge.agent.calls().await.len(), 2);
    assert_eq!(tokens.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn callback_errors_render_html() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tokens =
        MockTokenServer::start(vec![(400, r#"{"error":"invalid_grant"}"#.to_owned())]).await?;
    let bridge = TestBridge::new(dir.path(), &tokens.token_url())?;
    let server = test_server(&bridge)?;

    let missing = server.get("/api/auth/callback").add_query_param("code", "c").await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    assert!(missing.text().contains("Missing code or state"));

    let garbled = server
        .get("/api/auth/callback")
        .add_query_param("code", "c")
        .add_query_param("state", "not-json")
        .await;
    garbled.assert_status(StatusCode::BAD_REQUEST);
    assert!(garbled.text().contains("Invalid state format"));

    let state = PendingRequest::new(&identity("123")?, "hi").encode();
    let rejected = server
        .get("/api/auth/callback")
        .add_query_param("code", "stale")
        .add_query_param("state", &state)
        .await;
    rejected.assert_status(StatusCode::BAD_GATEWAY);
    assert!(!bridge.state.store.exists());
    assert!(bridge.agent.calls().await.is_empty());
    assert!(bridge.sink.sent().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn chat_generates_thread_id_when_absent() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::new(dir.path(), UNUSED_TOKEN_URL)?;
    let server = test_server(&bridge)?;

    let resp = server.post("/api/chat").json(&serde_json::json!({ "message": "hi" })).await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["response"], "reply to: hi");
    let thread_id = body["thread_id"].as_str().unwrap_or_default();
    uuid::Uuid::parse_str(thread_id)?;

    let resp = server
        .post("/api/chat")
        .json(&serde_json::json!({ "message": "again", "thread_id": "t-1" }))
        .await;
    let body: Value = resp.json();
    assert_eq!(body["thread_id"], "t-1");
    assert_eq!(bridge.agent.calls().await[1], ("again".to_owned(), "t-1".to_owned()));
    Ok(())
}

#[tokio::test]
async fn chat_requires_bearer_when_configured() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bridge = TestBridge::with_args(dir.path(), UNUSED_TOKEN_URL, &["--api-token", "secret-token"])?;
    let server = test_server(&bridge)?;
    let body = serde_json::json!({ "message": "hi" });

    server.post("/api/chat").json(&body).await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/api/chat")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong-token"))
        .json(&body)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/api/chat")
        .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"))
        .json(&body)
        .await
        .assert_status_ok();

    // Other routes stay open.
    server.get("/api/health").await.assert_status_ok();
    Ok(())
}
