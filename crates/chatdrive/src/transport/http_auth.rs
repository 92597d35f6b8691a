// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser-facing consent endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect};
use serde::Deserialize;

use crate::auth::PendingRequest;
use crate::error::BridgeError;
use crate::identity::Identity;
use crate::state::AppState;

pub const SUCCESS_HTML: &str =
    "<h2>✅ You're authenticated! Go back to WhatsApp and continue your chat.</h2>";

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    #[serde(default)]
    pub user_number: String,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// `GET /api/auth/redirect`: send the browser to the provider's consent page.
pub async fn redirect(
    State(s): State<Arc<AppState>>,
    Query(q): Query<RedirectQuery>,
) -> impl IntoResponse {
    let Some(identity) = Identity::parse(&q.user_number) else {
        return BridgeError::BadRequest.to_html_response("Missing user number.").into_response();
    };
    match s.consent.authorization_url(&PendingRequest::new(&identity, q.msg)) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            tracing::error!(identity = %identity, err = %e, "failed to build consent URL");
            BridgeError::from_auth(&e).to_html_response("Could not start authentication.").into_response()
        }
    }
}

/// `GET /api/auth/callback`: provider redirect after consent.
pub async fn callback(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> impl IntoResponse {
    match s.consent.handle_callback(q.code.as_deref(), q.state.as_deref()).await {
        Ok(_) => Html(SUCCESS_HTML).into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "consent callback failed");
            let code = BridgeError::from_auth(&e);
            let message = match code {
                BridgeError::BadRequest => e.to_string(),
                BridgeError::UpstreamError => "Authentication with the provider failed.".to_owned(),
                _ => "Something went wrong while finishing authentication.".to_owned(),
            };
            code.to_html_response(&message).into_response()
        }
    }
}
