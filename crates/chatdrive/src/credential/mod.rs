// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage-account OAuth credentials: the shared on-disk artifact, its
//! sidecar copy, provider token calls, and the source fallback chain.
//!
//! There is exactly one credential artifact per process, not one per sender.
//! Which sender it belongs to is recorded separately by
//! [`crate::registry::ActiveUserRegistry`].

pub mod oauth;
pub mod persist;
pub mod refresh;
pub mod source;
pub mod store;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::oauth::{OAuthClient, TokenResponse};

/// Capabilities requested on every consent: storage, spreadsheets, mail.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://mail.google.com/",
];

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// File name shared by the primary artifact and the sidecar copy.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Suffix of per-sender leftovers removed whenever a fresh flow is forced.
pub const LEFTOVER_SUFFIX: &str = ".multi.json";

/// A token within this many seconds of its expiry is treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Access/refresh token pair for the storage account, in the authorized-user
/// JSON layout other Google tooling reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Absent means the token does not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build a credential from a token endpoint response.
    pub fn from_token_response(token: TokenResponse, client: &OAuthClient) -> Self {
        let scopes = match token.scope {
            Some(ref s) if !s.trim().is_empty() => s.split_whitespace().map(String::from).collect(),
            _ => SCOPES.iter().map(|s| (*s).to_owned()).collect(),
        };
        Self {
            token: token.access_token,
            refresh_token: token.refresh_token,
            token_uri: client.token_uri.clone(),
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            scopes,
            expiry: expiry_from_now(token.expires_in),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|exp| exp <= now + chrono::Duration::seconds(EXPIRY_SKEW_SECS))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// `expires_in == 0` means the provider gave no expiry.
pub(crate) fn expiry_from_now(expires_in: u64) -> Option<DateTime<Utc>> {
    if expires_in == 0 {
        return None;
    }
    let secs = i64::try_from(expires_in).unwrap_or(i64::MAX);
    Utc::now().checked_add_signed(chrono::Duration::seconds(secs))
}

/// Where the credential artifacts live.
#[derive(Debug, Clone)]
pub struct CredentialPaths {
    /// Shared artifact whose presence the auth gate checks.
    pub primary: PathBuf,
    /// Backup copy read independently by the mail/document tooling.
    pub sidecar: PathBuf,
    /// Directory scanned for `*.multi.json` leftovers.
    pub leftover_dir: PathBuf,
}

impl CredentialPaths {
    pub fn new(data_dir: PathBuf, sidecar: PathBuf) -> Self {
        Self { primary: data_dir.join(CREDENTIALS_FILE), sidecar, leftover_dir: data_dir }
    }
}

/// Default sidecar location: `$HOME/.gmail-mcp/credentials.json`.
pub fn default_sidecar_path() -> PathBuf {
    let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));
    home.join(".gmail-mcp").join(CREDENTIALS_FILE)
}

/// Failures of the credential lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credential not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    MalformedState(String),
    #[error("token exchange failed: {0}")]
    ExchangeFailure(String),
    #[error("token refresh failed: {0}")]
    RefreshFailure(String),
    #[error("credential expired and has no refresh token")]
    ReauthRequired,
    #[error("all credential sources failed: {}", .0.join("; "))]
    AllSourcesFailed(Vec<String>),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuthError {
    /// Whether this outcome should send the sender back through consent.
    pub fn needs_consent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::RefreshFailure(_) | Self::ReauthRequired)
    }
}

/// A best-effort deletion that did not succeed. Logged, never raised.
#[derive(Debug, Clone)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub error: String,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to delete {}: {}", self.path.display(), self.error)
    }
}
