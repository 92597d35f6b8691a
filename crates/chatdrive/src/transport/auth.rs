// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request authentication for the non-browser endpoints: bearer tokens on
//! the chat API and Twilio signatures on the webhook.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::BridgeError;
use crate::messaging::twilio::{verify_signature, SIGNATURE_HEADER};
use crate::state::AppState;

/// Constant-time string comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check `Authorization: Bearer <token>`. No expected token means open.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), BridgeError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(BridgeError::Unauthorized)?;
    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(BridgeError::Unauthorized)
    }
}

/// Middleware guarding `/api/chat` with the configured API token.
pub async fn chat_auth_layer(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Err(code) = validate_bearer(req.headers(), state.config.api_token.as_deref()) {
        return code.to_http_response("unauthorized").into_response();
    }
    next.run(req).await
}

/// Check a webhook's Twilio signature when both the auth token and the
/// public webhook URL are configured; otherwise accept.
pub fn validate_twilio(
    headers: &HeaderMap,
    params: &BTreeMap<String, String>,
    auth_token: Option<&str>,
    webhook_url: Option<&str>,
) -> Result<(), BridgeError> {
    let (Some(token), Some(url)) = (
        auth_token.filter(|t| !t.trim().is_empty()),
        webhook_url.filter(|u| !u.trim().is_empty()),
    ) else {
        return Ok(());
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(BridgeError::Unauthorized)?;
    if verify_signature(token, url, params, signature) {
        Ok(())
    } else {
        Err(BridgeError::Unauthorized)
    }
}
