// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::credential::oauth::{load_client_secrets, OAuthClient};
use crate::credential::{default_sidecar_path, CredentialPaths, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};
use crate::messaging::twilio::TwilioConfig;

/// Path of the provider callback, relative to the public URL.
pub const CALLBACK_PATH: &str = "/api/auth/callback";
/// Path of the consent redirect, relative to the public URL.
pub const REDIRECT_PATH: &str = "/api/auth/redirect";

/// WhatsApp-to-storage assistant bridge.
#[derive(Debug, Clone, Parser)]
#[command(name = "chatdrive", version, about)]
pub struct BridgeConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "CHATDRIVE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000, env = "CHATDRIVE_PORT")]
    pub port: u16,

    /// Externally reachable base URL; consent links and the OAuth redirect
    /// URI are built from it.
    #[arg(long, default_value = "http://localhost:8000", env = "GOAUTH_REDIRECT_URL")]
    pub public_url: String,

    /// Directory holding the credential artifact, leftovers, and the
    /// active-user slot.
    #[arg(long, default_value = ".", env = "CHATDRIVE_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Sidecar credential copy read by the mail tooling.
    /// Defaults to `$HOME/.gmail-mcp/credentials.json`.
    #[arg(long, env = "CHATDRIVE_SIDECAR_PATH")]
    pub sidecar_path: Option<PathBuf>,

    /// OAuth client-secrets file downloaded from the provider console.
    #[arg(long, default_value = "gcp-oauth.keys.json", env = "CHATDRIVE_CLIENT_SECRETS")]
    pub client_secrets: PathBuf,

    /// OAuth client id. Overrides the client-secrets file.
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// OAuth client secret. Overrides the client-secrets file.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
    pub google_client_secret: Option<String>,

    #[arg(long, default_value = DEFAULT_AUTH_URI, env = "GOOGLE_AUTH_URI")]
    pub google_auth_uri: String,

    #[arg(long, default_value = DEFAULT_TOKEN_URI, env = "GOOGLE_TOKEN_URI")]
    pub google_token_uri: String,

    /// JSON file with a `token_json` entry tried before the stored artifact
    /// when the document tools need a credential.
    #[arg(long, env = "CHATDRIVE_SECRETS_FILE")]
    pub secrets_file: Option<PathBuf>,

    /// Bearer token required on `/api/chat`. If unset, the endpoint is open.
    #[arg(long, env = "CHATDRIVE_API_TOKEN")]
    pub api_token: Option<String>,

    #[arg(long, env = "TWILIO_ACCOUNT_SID")]
    pub twilio_account_sid: Option<String>,

    /// Also used to verify webhook signatures.
    #[arg(long, env = "TWILIO_AUTH_TOKEN")]
    pub twilio_auth_token: Option<String>,

    /// Sending number, with or without the `whatsapp:` prefix.
    #[arg(long, env = "TWILIO_WHATSAPP_NUMBER")]
    pub twilio_whatsapp_number: Option<String>,

    #[arg(long, default_value = "https://api.twilio.com", env = "TWILIO_API_BASE_URL")]
    pub twilio_api_base: String,

    /// Public webhook URL as Twilio sees it. Enables signature checks.
    #[arg(long, env = "TWILIO_WEBHOOK_URL")]
    pub twilio_webhook_url: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[arg(long, default_value = "https://api.openai.com/v1", env = "OPENAI_API_BASE")]
    pub openai_api_base: String,

    #[arg(long, default_value = "gpt-4o", env = "OPENAI_MODEL")]
    pub openai_model: String,

    /// Upper bound on tool-call rounds per agent reply.
    #[arg(long, default_value_t = 8, env = "CHATDRIVE_AGENT_MAX_TOOL_ROUNDS")]
    pub agent_max_tool_rounds: u32,

    /// Conversation threads kept in memory; the least recently used is dropped first.
    #[arg(long, default_value_t = 256, env = "CHATDRIVE_AGENT_MAX_THREADS")]
    pub agent_max_threads: usize,

    #[arg(long, default_value = "https://www.googleapis.com/drive/v3", env = "CHATDRIVE_DRIVE_API_BASE")]
    pub drive_api_base: String,

    /// Deployment environment (`development` or `production`).
    #[arg(long, default_value = "development", env = "ENVIRONMENT")]
    pub environment: String,

    /// Log format (json or text). Defaults to json in production.
    #[arg(long, env = "CHATDRIVE_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Log level (trace, debug, info, warn, error). Defaults to info in
    /// production, debug otherwise.
    #[arg(long, env = "CHATDRIVE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl BridgeConfig {
    /// Validate the configuration and return an error if invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.public_url)
            .map_err(|e| anyhow::anyhow!("invalid public url {:?}: {e}", self.public_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("public url must be http or https, got {}", url.scheme());
        }
        if self.google_client_id.is_some() != self.google_client_secret.is_some() {
            anyhow::bail!("--google-client-id and --google-client-secret must be set together");
        }
        if self.agent_max_tool_rounds == 0 {
            anyhow::bail!("--agent-max-tool-rounds must be at least 1");
        }
        if self.agent_max_threads == 0 {
            anyhow::bail!("--agent-max-threads must be at least 1");
        }
        if let Some(ref format) = self.log_format {
            if !matches!(format.as_str(), "json" | "text") {
                anyhow::bail!("invalid log format: {format}");
            }
        }
        self.oauth_client()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_format(&self) -> &str {
        match self.log_format {
            Some(ref f) => f,
            None if self.is_production() => "json",
            None => "text",
        }
    }

    pub fn log_level(&self) -> &str {
        match self.log_level {
            Some(ref l) => l,
            None if self.is_production() => "info",
            None => "debug",
        }
    }

    /// Public URL without a trailing slash.
    pub fn public_base(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.public_base())
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.sidecar_path.clone().unwrap_or_else(default_sidecar_path)
    }

    pub fn credential_paths(&self) -> CredentialPaths {
        CredentialPaths::new(self.data_dir.clone(), self.sidecar_path())
    }

    /// Resolve the OAuth client: explicit id/secret first, then the
    /// client-secrets file.
    pub fn oauth_client(&self) -> anyhow::Result<OAuthClient> {
        let redirect_uri = self.redirect_uri();
        if let (Some(id), Some(secret)) = (&self.google_client_id, &self.google_client_secret) {
            return Ok(OAuthClient {
                client_id: id.clone(),
                client_secret: secret.clone(),
                auth_uri: self.google_auth_uri.clone(),
                token_uri: self.google_token_uri.clone(),
                redirect_uri,
            });
        }

        let secrets = load_client_secrets(&self.client_secrets)?;
        Ok(OAuthClient {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            auth_uri: secrets.auth_uri.unwrap_or_else(|| self.google_auth_uri.clone()),
            token_uri: secrets.token_uri.unwrap_or_else(|| self.google_token_uri.clone()),
            redirect_uri,
        })
    }

    /// Twilio sending settings, when account, token, and number are all set.
    pub fn twilio(&self) -> Option<TwilioConfig> {
        match (&self.twilio_account_sid, &self.twilio_auth_token, &self.twilio_whatsapp_number) {
            (Some(sid), Some(token), Some(from)) => Some(TwilioConfig {
                account_sid: sid.clone(),
                auth_token: token.clone(),
                from: from.clone(),
                api_base: self.twilio_api_base.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
