// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the bridge.

pub mod auth;
pub mod http;
pub mod http_auth;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{CALLBACK_PATH, REDIRECT_PATH};
use crate::state::AppState;

/// Build the axum `Router` with all bridge routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let chat = Router::new()
        .route("/api/chat", post(http::chat))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::chat_auth_layer));

    Router::new()
        // Health (no auth)
        .route("/api/health", get(http::health))
        // Inbound messages (Twilio signature checked in the handler)
        .route("/api/webhook", post(http::webhook))
        // Consent flow (browser-facing)
        .route(REDIRECT_PATH, get(http_auth::redirect))
        .route(CALLBACK_PATH, get(http_auth::callback))
        .merge(chat)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
