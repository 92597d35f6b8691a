// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth consent detour.
//!
//! The sender's identity and original message ride through the provider in
//! the `state` parameter as percent-encoded JSON. The state is not signed:
//! whoever completes a consent with a crafted state becomes the active user
//! for the identity it names.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::agent::AgentService;
use crate::config::REDIRECT_PATH;
use crate::credential::oauth::{build_auth_url, exchange_code, OAuthClient};
use crate::credential::store::CredentialStore;
use crate::credential::{AuthError, Credential, SCOPES};
use crate::identity::{Identity, ThreadKey};
use crate::messaging::MessageSink;
use crate::registry::ActiveUserRegistry;

/// The message that triggered a consent flow, carried through `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub user_number: String,
    #[serde(default)]
    pub msg: String,
}

impl PendingRequest {
    pub fn new(identity: &Identity, msg: impl Into<String>) -> Self {
        Self { user_number: identity.as_str().to_owned(), msg: msg.into() }
    }

    /// JSON, then percent-encoded.
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        urlencoding::encode(&json).into_owned()
    }

    pub fn decode(state: &str) -> Result<Self, AuthError> {
        let json = urlencoding::decode(state)
            .map_err(|e| AuthError::MalformedState(format!("Invalid state format: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| AuthError::MalformedState(format!("Invalid state format: {e}")))
    }

    pub fn identity(&self) -> Result<Identity, AuthError> {
        Identity::parse(&self.user_number).ok_or_else(|| {
            AuthError::MalformedState("Invalid state format: empty user_number".to_owned())
        })
    }
}

/// Issues consent links and completes the provider callback.
pub struct ConsentBroker {
    client: OAuthClient,
    public_base: String,
    http: reqwest::Client,
    store: Arc<CredentialStore>,
    registry: Arc<ActiveUserRegistry>,
    agent: Arc<dyn AgentService>,
    sink: Arc<dyn MessageSink>,
}

impl ConsentBroker {
    pub fn new(
        client: OAuthClient,
        public_base: impl Into<String>,
        store: Arc<CredentialStore>,
        registry: Arc<ActiveUserRegistry>,
        agent: Arc<dyn AgentService>,
        sink: Arc<dyn MessageSink>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            public_base: public_base.into().trim_end_matches('/').to_owned(),
            http,
            store,
            registry,
            agent,
            sink,
        })
    }

    /// Link sent to the sender; it lands on our redirect endpoint, which
    /// forwards the browser to the provider.
    pub fn redirect_link(&self, identity: &Identity, msg: &str) -> String {
        format!(
            "{}{REDIRECT_PATH}?user_number={}&msg={}",
            self.public_base,
            urlencoding::encode(identity.as_str()),
            urlencoding::encode(msg)
        )
    }

    /// Provider consent URL carrying `request` as state.
    pub fn authorization_url(&self, request: &PendingRequest) -> Result<Url, AuthError> {
        Ok(build_auth_url(&self.client, SCOPES, &request.encode())?)
    }

    /// Complete the consent flow and resume the pending message.
    ///
    /// Returns the identity that is now active.
    pub async fn handle_callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let (Some(code), Some(state)) = (non_empty(code), non_empty(state)) else {
            return Err(AuthError::MalformedState(
                "Something went wrong. Missing code or state.".to_owned(),
            ));
        };
        let request = PendingRequest::decode(state)?;
        let identity = request.identity()?;

        let token = exchange_code(&self.http, &self.client, code).await?;
        let cred = Credential::from_token_response(token, &self.client);
        self.store.save(&identity, &cred)?;
        self.registry.set_active(&identity)?;
        tracing::info!(identity = %identity, "consent completed");

        let thread = ThreadKey::today(&identity);
        let reply = self.agent.process(&request.msg, &thread).await;
        self.sink.send(&identity, &reply).await?;
        Ok(identity)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "consent_tests.rs"]
mod tests;
