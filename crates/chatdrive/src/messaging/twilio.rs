// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Twilio WhatsApp delivery and webhook signature verification.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::identity::Identity;
use crate::messaging::MessageSink;

/// Twilio rejects WhatsApp bodies longer than this many characters.
pub const MAX_BODY_CHARS: usize = 1600;

/// Header carrying the request signature on inbound webhooks.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sending number; the `whatsapp:` channel prefix is added if missing.
    pub from: String,
    pub api_base: String,
}

pub struct TwilioSink {
    config: TwilioConfig,
    http: reqwest::Client,
}

impl TwilioSink {
    pub fn new(config: TwilioConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { config, http })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn from_address(&self) -> String {
        let from = self.config.from.trim();
        if from.starts_with("whatsapp:") {
            from.to_owned()
        } else {
            format!("whatsapp:{from}")
        }
    }

    async fn send_one(&self, to: &str, from: &str, body: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("twilio API error {status}: {text}");
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSink for TwilioSink {
    async fn send(&self, to: &Identity, body: &str) -> anyhow::Result<()> {
        let to_addr = to.whatsapp_address();
        let from = self.from_address();
        let chunks = chunk_body(body, MAX_BODY_CHARS);
        if chunks.is_empty() {
            tracing::warn!(to = %to, "not sending a blank whatsapp message");
            return Ok(());
        }
        for chunk in &chunks {
            self.send_one(&to_addr, &from, chunk).await?;
        }
        tracing::info!(to = %to, chunks = chunks.len(), "sent whatsapp message");
        Ok(())
    }
}

/// Split `body` into pieces of at most `max` characters, preferring to break
/// after a newline or space. Blank bodies yield no pieces, and no piece is
/// ever empty.
pub fn chunk_body(body: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    if body.trim().is_empty() {
        return chunks;
    }
    let mut rest = body;

    while rest.chars().count() > max {
        let hard = rest.char_indices().nth(max).map_or(rest.len(), |(i, _)| i);
        let cut = if rest[hard..].starts_with(char::is_whitespace) {
            hard
        } else {
            rest[..hard]
                .rfind(['\n', ' '])
                .filter(|&i| i > 0)
                .map_or(hard, |i| i + 1)
        };
        let piece = rest[..cut].trim_end();
        if !piece.is_empty() {
            chunks.push(piece.to_owned());
        }
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        chunks.push(rest.to_owned());
    }
    chunks
}

/// Compute the signature Twilio sends for a form-encoded webhook: HMAC-SHA1
/// over the webhook URL followed by every parameter name and value in name
/// order, keyed by the auth token, base64-encoded.
pub fn expected_signature(auth_token: &str, url: &str, params: &BTreeMap<String, String>) -> String {
    let mut data = url.to_owned();
    for (key, value) in params {
        data.push_str(key);
        data.push_str(value);
    }
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) else {
        return String::new();
    };
    mac.update(data.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Check a webhook signature. The comparison is constant-time.
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    signature: &str,
) -> bool {
    let expected = expected_signature(auth_token, url, params);
    !expected.is_empty() && crate::transport::auth::constant_time_eq(&expected, signature)
}
