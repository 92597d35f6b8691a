// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for health, the messaging webhook, and direct chat.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::identity::{Identity, ThreadKey};
use crate::state::AppState;
use crate::transport::auth::validate_twilio;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub thread_id: String,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_owned(),
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}

/// `POST /api/webhook`: inbound WhatsApp message (Twilio form post).
///
/// Once the form is accepted the response is always an empty 200, whatever
/// happens downstream, so the provider never retries.
pub async fn webhook(
    State(s): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let params: BTreeMap<String, String> = match serde_urlencoded::from_bytes(&body) {
        Ok(p) => p,
        Err(e) => {
            return BridgeError::Unprocessable
                .to_http_response(format!("invalid form body: {e}"))
                .into_response();
        }
    };

    if let Err(code) = validate_twilio(
        &headers,
        &params,
        s.config.twilio_auth_token.as_deref(),
        s.config.twilio_webhook_url.as_deref(),
    ) {
        tracing::warn!("webhook signature rejected");
        return code.to_http_response("invalid signature").into_response();
    }

    let sender = params.get("From").and_then(|f| Identity::parse(f));
    let text = params.get("Body").map(String::as_str).filter(|b| !b.trim().is_empty());
    let (Some(sender), Some(text)) = (sender, text) else {
        return BridgeError::Unprocessable
            .to_http_response("From and Body are required")
            .into_response();
    };

    tracing::info!(identity = %sender, len = text.len(), "inbound message");
    if let Err(e) = s.router.handle(&sender, text).await {
        tracing::error!(identity = %sender, err = %e, "failed to handle inbound message");
    }
    StatusCode::OK.into_response()
}

/// `POST /api/chat`: talk to the agent directly, bypassing the gate.
pub async fn chat(
    State(s): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let thread_id = req
        .thread_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let response = s.agent.process(&req.message, &ThreadKey::from_raw(thread_id.clone())).await;
    Json(ChatResponse { response, thread_id })
}

