// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound message routing: gate the sender, then either answer through the
//! agent or send a consent link and park the message in it.

use std::sync::Arc;

use crate::agent::AgentService;
use crate::auth::{AuthGate, ConsentBroker};
use crate::identity::{Identity, ThreadKey};
use crate::messaging::MessageSink;

/// Prefix of the message carrying the consent link.
pub const CONSENT_PROMPT: &str = "🔒 Please authenticate to continue:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The sender was sent a consent link; the message waits in its state.
    ConsentRequested,
    /// The agent answered and the reply was sent.
    Replied,
}

pub struct InboundRouter {
    gate: AuthGate,
    consent: Arc<ConsentBroker>,
    agent: Arc<dyn AgentService>,
    sink: Arc<dyn MessageSink>,
}

impl InboundRouter {
    pub fn new(
        gate: AuthGate,
        consent: Arc<ConsentBroker>,
        agent: Arc<dyn AgentService>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self { gate, consent, agent, sink }
    }

    pub async fn handle(&self, sender: &Identity, text: &str) -> anyhow::Result<RouteOutcome> {
        let thread = ThreadKey::today(sender);

        if !self.gate.check(sender).await.is_authenticated() {
            let link = self.consent.redirect_link(sender, text);
            self.sink.send(sender, &format!("{CONSENT_PROMPT} {link}")).await?;
            tracing::info!(identity = %sender, "consent link sent");
            return Ok(RouteOutcome::ConsentRequested);
        }

        let reply = self.agent.process(text, &thread).await;
        self.sink.send(sender, &reply).await?;
        tracing::debug!(identity = %sender, thread = %thread, "reply sent");
        Ok(RouteOutcome::Replied)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::credential::oauth::OAuthClient;
    use crate::credential::store::CredentialStore;
    use crate::credential::CredentialPaths;
    use crate::registry::ActiveUserRegistry;
    use crate::test_support::{sample_credential, MockTokenServer, RecordingSink, ScriptedAgent};

    struct Fixture {
        router: InboundRouter,
        store: Arc<CredentialStore>,
        registry: Arc<ActiveUserRegistry>,
        agent: Arc<ScriptedAgent>,
        sink: Arc<RecordingSink>,
    }

    fn fixture(root: &Path, token_url: &str) -> anyhow::Result<Fixture> {
        crate::test_support::install_crypto_provider();
        let data = root.join("data");
        let store = Arc::new(CredentialStore::new(CredentialPaths::new(
            data.clone(),
            root.join("sidecar.json"),
        ))?);
        let registry = Arc::new(ActiveUserRegistry::in_dir(&data));
        let agent = Arc::new(ScriptedAgent::new());
        let sink = Arc::new(RecordingSink::new());
        let client = OAuthClient {
            client_id: "client-id".to_owned(),
            client_secret: "client-secret".to_owned(),
            auth_uri: "https://accounts.test/o/oauth2/auth".to_owned(),
            token_uri: token_url.to_owned(),
            redirect_uri: "http://bridge.test/api/auth/callback".to_owned(),
        };
        let consent = Arc::new(ConsentBroker::new(
            client,
            "http://bridge.test",
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&agent) as Arc<dyn AgentService>,
            Arc::clone(&sink) as Arc<dyn MessageSink>,
        )?);
        let router = InboundRouter::new(
            AuthGate::new(Arc::clone(&store), Arc::clone(&registry)),
            consent,
            Arc::clone(&agent) as Arc<dyn AgentService>,
            Arc::clone(&sink) as Arc<dyn MessageSink>,
        );
        Ok(Fixture { router, store, registry, agent, sink })
    }

    fn id(raw: &str) -> anyhow::Result<Identity> {
        Identity::parse(raw).ok_or_else(|| anyhow::anyhow!("blank identity"))
    }

    #[tokio::test]
    async fn unauthenticated_sender_gets_one_consent_link() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fx = fixture(dir.path(), "http://127.0.0.1:9/token")?;

        let outcome = fx.router.handle(&id("12345")?, "hello").await?;
        assert_eq!(outcome, RouteOutcome::ConsentRequested);

        let sent = fx.sink.sent().await;
        assert_eq!(sent.len(), 1);
        let (to, body) = &sent[0];
        assert_eq!(to, "12345");
        assert!(body.starts_with(CONSENT_PROMPT));
        assert!(body.contains("user_number=12345"));
        assert!(body.contains("msg=hello"));
        assert!(fx.agent.calls().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn authenticated_sender_is_answered_without_provider_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let server = MockTokenServer::start(vec![(500, "{}".to_owned())]).await?;
        let fx = fixture(dir.path(), &server.token_url())?;
        let sender = id("123")?;
        fx.store.save(&sender, &sample_credential(&server.token_url(), false))?;
        fx.registry.set_active(&sender)?;

        assert_eq!(fx.router.handle(&sender, "first").await?, RouteOutcome::Replied);
        assert_eq!(fx.router.handle(&sender, "second").await?, RouteOutcome::Replied);

        assert_eq!(server.calls(), 0);
        let thread = ThreadKey::today(&sender).as_str().to_owned();
        assert_eq!(
            fx.agent.calls().await,
            vec![("first".to_owned(), thread.clone()), ("second".to_owned(), thread)]
        );
        let bodies: Vec<String> = fx.sink.sent().await.into_iter().map(|(_, b)| b).collect();
        assert_eq!(bodies, vec!["reply to: first".to_owned(), "reply to: second".to_owned()]);
        Ok(())
    }

    #[tokio::test]
    async fn sink_failure_is_reported_to_caller() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fx = fixture(dir.path(), "http://127.0.0.1:9/token")?;
        fx.sink.fail_sends();
        crate::assert_err_contains!(fx.router.handle(&id("1")?, "hi").await, "sink unavailable");
        Ok(())
    }
}
