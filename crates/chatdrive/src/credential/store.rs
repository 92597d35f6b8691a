// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared credential artifact and its sidecar copy.

use std::time::Duration;

use crate::credential::persist::{self, remove_if_exists};
use crate::credential::refresh;
use crate::credential::{AuthError, CleanupWarning, Credential, CredentialPaths, LEFTOVER_SUFFIX};
use crate::identity::Identity;

/// Owns the on-disk credential artifacts.
///
/// The artifact is shared: `identity` parameters are used for logging only.
/// The registry decides whose credential it is.
pub struct CredentialStore {
    paths: CredentialPaths,
    http: reqwest::Client,
}

impl CredentialStore {
    pub fn new(paths: CredentialPaths) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { paths, http })
    }

    pub fn paths(&self) -> &CredentialPaths {
        &self.paths
    }

    /// Whether the primary artifact is present (contents are not checked).
    pub fn exists(&self) -> bool {
        self.paths.primary.exists()
    }

    /// Read and parse the primary artifact.
    pub fn load(&self, identity: &Identity) -> Result<Credential, AuthError> {
        persist::load(&self.paths.primary).map_err(|e| {
            tracing::debug!(identity = %identity, err = %e, "no usable credential artifact");
            AuthError::NotFound(format!("{}: {e}", self.paths.primary.display()))
        })
    }

    /// Write the primary artifact, then the sidecar copy. Overwrites both.
    pub fn save(&self, identity: &Identity, cred: &Credential) -> anyhow::Result<()> {
        persist::save(&self.paths.primary, cred)?;
        persist::save(&self.paths.sidecar, cred)?;
        tracing::info!(
            identity = %identity,
            primary = %self.paths.primary.display(),
            sidecar = %self.paths.sidecar.display(),
            "credentials saved"
        );
        Ok(())
    }

    /// Refresh `cred` if it has expired.
    pub async fn refresh_if_needed(&self, cred: Credential) -> Result<Credential, AuthError> {
        refresh::refresh_if_needed(&self.http, cred).await
    }

    /// Load, refresh when expired, and persist the refreshed credential.
    pub async fn ensure_fresh(&self, identity: &Identity) -> Result<Credential, AuthError> {
        let cred = self.load(identity)?;
        let fresh = self.refresh_if_needed(cred.clone()).await?;
        if fresh != cred {
            self.save(identity, &fresh)?;
        }
        Ok(fresh)
    }

    /// Remove the primary artifact, every `*.multi.json` leftover, and the
    /// sidecar copy. Each removal is attempted regardless of the others.
    pub fn delete(&self, identity: &Identity) -> Vec<CleanupWarning> {
        let mut warnings = Vec::new();

        if let Err(w) = remove_if_exists(&self.paths.primary) {
            warnings.push(w);
        }

        match std::fs::read_dir(&self.paths.leftover_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_leftover = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(LEFTOVER_SUFFIX));
                    if is_leftover {
                        if let Err(w) = remove_if_exists(&path) {
                            warnings.push(w);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warnings.push(CleanupWarning {
                path: self.paths.leftover_dir.clone(),
                error: e.to_string(),
            }),
        }

        if let Err(w) = remove_if_exists(&self.paths.sidecar) {
            warnings.push(w);
        }

        for w in &warnings {
            tracing::warn!(identity = %identity, "{w}");
        }
        warnings
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
