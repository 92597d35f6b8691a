// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::agent::AgentService;
use crate::auth::{AuthGate, ConsentBroker};
use crate::config::BridgeConfig;
use crate::credential::store::CredentialStore;
use crate::messaging::MessageSink;
use crate::registry::ActiveUserRegistry;
use crate::router::InboundRouter;

/// Shared bridge state handed to every HTTP handler.
pub struct AppState {
    pub config: BridgeConfig,
    pub store: Arc<CredentialStore>,
    pub registry: Arc<ActiveUserRegistry>,
    pub agent: Arc<dyn AgentService>,
    pub consent: Arc<ConsentBroker>,
    pub router: InboundRouter,
}

impl AppState {
    /// Wire the credential lifecycle, consent broker, and router around the
    /// given agent and sink. Fails if the OAuth client cannot be resolved.
    pub fn new(
        config: BridgeConfig,
        agent: Arc<dyn AgentService>,
        sink: Arc<dyn MessageSink>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(CredentialStore::new(config.credential_paths())?);
        let registry = Arc::new(ActiveUserRegistry::in_dir(&config.data_dir));
        Self::with_store(config, store, registry, agent, sink)
    }

    /// Like [`AppState::new`] with a caller-supplied store and registry, so
    /// the agent's credential chain can share them.
    pub fn with_store(
        config: BridgeConfig,
        store: Arc<CredentialStore>,
        registry: Arc<ActiveUserRegistry>,
        agent: Arc<dyn AgentService>,
        sink: Arc<dyn MessageSink>,
    ) -> anyhow::Result<Self> {
        let consent = Arc::new(ConsentBroker::new(
            config.oauth_client()?,
            config.public_base(),
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&agent),
            Arc::clone(&sink),
        )?);
        let router = InboundRouter::new(
            AuthGate::new(Arc::clone(&store), Arc::clone(&registry)),
            Arc::clone(&consent),
            Arc::clone(&agent),
            sink,
        );
        Ok(Self { config, store, registry, agent, consent, router })
    }
}
