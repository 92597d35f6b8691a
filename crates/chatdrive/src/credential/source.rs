// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered credential sources for the document tools.
//!
//! The tools run on behalf of whoever holds the active slot. A deployment may
//! also inject a credential through a secrets file, tried first.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::credential::store::CredentialStore;
use crate::credential::{AuthError, Credential};
use crate::registry::ActiveUserRegistry;

#[async_trait]
pub trait CredentialSource: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a currently valid credential.
    async fn fetch(&self) -> Result<Credential, AuthError>;
}

/// Secrets-file layout: the authorized-user JSON embedded as a string.
#[derive(Debug, Deserialize)]
struct SecretsEntry {
    token_json: String,
}

/// Reads `{"token_json": "<credential json>"}` and refreshes in memory.
/// Refreshed tokens are not written back.
pub struct SecretsFileSource {
    path: PathBuf,
    store: Arc<CredentialStore>,
}

impl SecretsFileSource {
    pub fn new(path: PathBuf, store: Arc<CredentialStore>) -> Self {
        Self { path, store }
    }
}

#[async_trait]
impl CredentialSource for SecretsFileSource {
    fn name(&self) -> &str {
        "secrets-file"
    }

    async fn fetch(&self) -> Result<Credential, AuthError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AuthError::NotFound(format!("{}: {e}", self.path.display())))?;
        let entry: SecretsEntry = serde_json::from_str(&contents)
            .map_err(|e| AuthError::NotFound(format!("{}: {e}", self.path.display())))?;
        let cred: Credential = serde_json::from_str(&entry.token_json)
            .map_err(|e| AuthError::NotFound(format!("token_json: {e}")))?;
        self.store.refresh_if_needed(cred).await
    }
}

/// The shared artifact, valid only while someone holds the active slot.
pub struct StoredSource {
    store: Arc<CredentialStore>,
    registry: Arc<ActiveUserRegistry>,
}

impl StoredSource {
    pub fn new(store: Arc<CredentialStore>, registry: Arc<ActiveUserRegistry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl CredentialSource for StoredSource {
    fn name(&self) -> &str {
        "stored"
    }

    async fn fetch(&self) -> Result<Credential, AuthError> {
        let identity = self
            .registry
            .active()
            .ok_or_else(|| AuthError::NotFound("no active user".to_owned()))?;
        self.store.ensure_fresh(&identity).await
    }
}

/// Tries each source in order; the first success wins.
pub struct CredentialChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialChain {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Secrets file (when configured) followed by the stored artifact.
    pub fn standard(
        secrets_file: Option<PathBuf>,
        store: Arc<CredentialStore>,
        registry: Arc<ActiveUserRegistry>,
    ) -> Self {
        let mut sources: Vec<Box<dyn CredentialSource>> = Vec::new();
        if let Some(path) = secrets_file {
            sources.push(Box::new(SecretsFileSource::new(path, Arc::clone(&store))));
        }
        sources.push(Box::new(StoredSource::new(store, registry)));
        Self::new(sources)
    }

    pub async fn resolve(&self) -> Result<Credential, AuthError> {
        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.fetch().await {
                Ok(cred) => {
                    tracing::debug!(source = source.name(), "credential resolved");
                    return Ok(cred);
                }
                Err(e) => {
                    tracing::debug!(source = source.name(), err = %e, "credential source failed");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }
        Err(AuthError::AllSourcesFailed(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialPaths;
    use crate::identity::Identity;
    use crate::test_support::{sample_credential, token_body, MockTokenServer};

    struct Fixture {
        _dir: tempfile::TempDir,
        dir: PathBuf,
        store: Arc<CredentialStore>,
        registry: Arc<ActiveUserRegistry>,
    }

    fn fixture() -> anyhow::Result<Fixture> {
        crate::test_support::install_crypto_provider();
        let dir = tempfile::tempdir()?;
        let path = dir.path().to_path_buf();
        let paths = CredentialPaths::new(path.clone(), path.join("sidecar").join("credentials.json"));
        Ok(Fixture {
            store: Arc::new(CredentialStore::new(paths)?),
            registry: Arc::new(ActiveUserRegistry::in_dir(&path)),
            dir: path,
            _dir: dir,
        })
    }

    fn write_secrets(path: &std::path::Path, cred: &Credential) -> anyhow::Result<()> {
        let inner = serde_json::to_string(cred)?;
        std::fs::write(path, serde_json::json!({ "token_json": inner }).to_string())?;
        Ok(())
    }

    #[tokio::test]
    async fn secrets_file_wins_when_present() -> anyhow::Result<()> {
        let fx = fixture()?;
        let secrets = fx.dir.join("secrets.json");
        write_secrets(&secrets, &sample_credential("http://127.0.0.1:9/token", false))?;

        let chain = CredentialChain::standard(Some(secrets), fx.store, fx.registry);
        let cred = chain.resolve().await?;
        assert_eq!(cred.token, "access-token");
        Ok(())
    }

    #[tokio::test]
    async fn falls_back_to_stored_artifact_of_active_user() -> anyhow::Result<()> {
        let fx = fixture()?;
        let id = Identity::parse("555").ok_or_else(|| anyhow::anyhow!("identity"))?;
        let mut stored = sample_credential("http://127.0.0.1:9/token", false);
        stored.token = "stored-token".to_owned();
        fx.store.save(&id, &stored)?;
        fx.registry.set_active(&id)?;

        let chain =
            CredentialChain::standard(Some(fx.dir.join("missing.json")), fx.store, fx.registry);
        let cred = chain.resolve().await?;
        assert_eq!(cred.token, "stored-token");
        Ok(())
    }

    #[tokio::test]
    async fn secrets_file_credential_is_refreshed_in_memory() -> anyhow::Result<()> {
        let fx = fixture()?;
        let server = MockTokenServer::start(vec![(200, token_body("fresh", None, 3600))]).await?;
        let secrets = fx.dir.join("secrets.json");
        write_secrets(&secrets, &sample_credential(&server.token_url(), true))?;

        let chain = CredentialChain::standard(Some(secrets.clone()), fx.store, fx.registry);
        let cred = chain.resolve().await?;
        assert_eq!(cred.token, "fresh");
        assert_eq!(cred.refresh_token.as_deref(), Some("refresh-token"));
        assert_eq!(server.calls(), 1);
        // The secrets file itself is left untouched.
        assert!(std::fs::read_to_string(&secrets)?.contains("access-token"));
        Ok(())
    }

    #[tokio::test]
    async fn all_failures_are_aggregated() -> anyhow::Result<()> {
        let fx = fixture()?;
        let chain =
            CredentialChain::standard(Some(fx.dir.join("missing.json")), fx.store, fx.registry);
        match chain.resolve().await {
            Err(AuthError::AllSourcesFailed(failures)) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("secrets-file:"));
                assert!(failures[1].contains("no active user"));
            }
            other => anyhow::bail!("expected AllSourcesFailed, got {other:?}"),
        }
        Ok(())
    }
}
