// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth client settings, authorization URL construction, and the
//! authorization-code exchange.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::credential::AuthError;

/// Standard OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Registered OAuth client used for consent and token calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uri: String,
}

/// Google client-secrets download (`gcp-oauth.keys.json`).
///
/// The file nests the settings under `web` or `installed` depending on the
/// client type chosen in the console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecretsFile {
    #[serde(default)]
    pub web: Option<ClientSecrets>,
    #[serde(default)]
    pub installed: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Read a client-secrets file, preferring the `web` section.
pub fn load_client_secrets(path: &Path) -> anyhow::Result<ClientSecrets> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read client secrets {}: {e}", path.display()))?;
    let file: ClientSecretsFile = serde_json::from_str(&contents)?;
    file.web
        .or(file.installed)
        .ok_or_else(|| anyhow::anyhow!("{} has neither a web nor an installed client", path.display()))
}

/// Build the provider consent URL.
///
/// Always asks for `prompt=consent` and `access_type=offline` so the
/// provider issues a refresh token on every grant.
pub fn build_auth_url(client: &OAuthClient, scopes: &[&str], state: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(&client.auth_uri)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &client.client_id)
        .append_pair("redirect_uri", &client.redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state)
        .append_pair("prompt", "consent")
        .append_pair("access_type", "offline");
    Ok(url)
}

/// Exchange an authorization code for tokens. Single attempt.
pub async fn exchange_code(
    http: &reqwest::Client,
    client: &OAuthClient,
    code: &str,
) -> Result<TokenResponse, AuthError> {
    let resp = http
        .post(&client.token_uri)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| AuthError::ExchangeFailure(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::ExchangeFailure(format!("{status}: {text}")));
    }

    resp.json().await.map_err(|e| AuthError::ExchangeFailure(e.to_string()))
}
