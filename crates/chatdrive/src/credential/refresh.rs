// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth token refresh. One attempt, no retries: a failed refresh sends the
//! sender back through consent instead.

use crate::credential::oauth::TokenResponse;
use crate::credential::{expiry_from_now, AuthError, Credential};

/// Perform a single token refresh request.
pub async fn do_refresh(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let resp = client
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await
        .map_err(|e| AuthError::RefreshFailure(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::RefreshFailure(format!("{status}: {text}")));
    }

    resp.json().await.map_err(|e| AuthError::RefreshFailure(e.to_string()))
}

/// Return `cred` unchanged if still valid, otherwise a refreshed copy.
///
/// Providers usually omit the refresh token on refresh; the old one is kept.
pub async fn refresh_if_needed(
    client: &reqwest::Client,
    cred: Credential,
) -> Result<Credential, AuthError> {
    if !cred.is_expired() {
        return Ok(cred);
    }
    let Some(refresh_token) = cred.refresh_token.clone() else {
        return Err(AuthError::ReauthRequired);
    };

    let token =
        do_refresh(client, &cred.token_uri, &cred.client_id, &cred.client_secret, &refresh_token)
            .await?;
    tracing::debug!("access token refreshed");

    Ok(Credential {
        token: token.access_token,
        refresh_token: token.refresh_token.or(Some(refresh_token)),
        expiry: expiry_from_now(token.expires_in),
        ..cred
    })
}
