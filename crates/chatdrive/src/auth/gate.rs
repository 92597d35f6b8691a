// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-message authentication decision.
//!
//! A sender is authenticated only when the shared credential artifact exists,
//! the sender holds the single active slot, and the credential is (or can be
//! refreshed to be) valid. Any other outcome evicts every credential artifact
//! so the next consent starts clean and no previous sender's token survives.

use std::sync::Arc;

use crate::credential::store::CredentialStore;
use crate::credential::CleanupWarning;
use crate::identity::Identity;
use crate::registry::ActiveUserRegistry;

/// Verdict for one inbound message. Re-evaluated on every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticated,
    Unauthenticated,
}

impl AuthDecision {
    pub fn is_authenticated(self) -> bool {
        self == Self::Authenticated
    }
}

pub struct AuthGate {
    store: Arc<CredentialStore>,
    registry: Arc<ActiveUserRegistry>,
}

impl AuthGate {
    pub fn new(store: Arc<CredentialStore>, registry: Arc<ActiveUserRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn check(&self, identity: &Identity) -> AuthDecision {
        if self.store.exists() && self.registry.is_active(identity) {
            match self.store.ensure_fresh(identity).await {
                Ok(_) => {
                    tracing::debug!(identity = %identity, "sender is the active authenticated user");
                    return AuthDecision::Authenticated;
                }
                Err(e) => {
                    tracing::info!(
                        identity = %identity,
                        err = %e,
                        needs_consent = e.needs_consent(),
                        "stored credential unusable"
                    );
                }
            }
        }

        let warnings = self.cleanup(identity);
        tracing::debug!(identity = %identity, warnings = warnings.len(), "sender not authenticated");
        AuthDecision::Unauthenticated
    }

    /// Best-effort removal of every credential artifact.
    fn cleanup(&self, identity: &Identity) -> Vec<CleanupWarning> {
        self.store.delete(identity)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
