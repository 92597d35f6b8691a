// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chatdrive: WhatsApp bridge to a Drive-aware assistant, gated by a
//! per-sender OAuth consent flow.

pub mod agent;
pub mod auth;
pub mod config;
pub mod credential;
pub mod drive;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod registry;
pub mod router;
pub mod state;
pub mod test_support;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::agent::openai::{OpenAiAgent, OpenAiConfig};
use crate::agent::tools::DriveTools;
use crate::agent::AgentService;
use crate::config::BridgeConfig;
use crate::credential::source::CredentialChain;
use crate::credential::store::CredentialStore;
use crate::drive::DriveClient;
use crate::messaging::twilio::TwilioSink;
use crate::messaging::{LogSink, MessageSink};
use crate::registry::ActiveUserRegistry;
use crate::state::AppState;
use crate::transport::build_router;

/// Run the bridge until Ctrl-C.
pub async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let sink: Arc<dyn MessageSink> = match config.twilio() {
        Some(twilio) => {
            tracing::info!(from = %twilio.from, "sending replies through Twilio");
            Arc::new(TwilioSink::new(twilio)?)
        }
        None => {
            tracing::warn!("Twilio not configured; outbound messages are only logged");
            Arc::new(LogSink)
        }
    };

    let store = Arc::new(CredentialStore::new(config.credential_paths())?);
    let registry = Arc::new(ActiveUserRegistry::in_dir(&config.data_dir));
    let chain = CredentialChain::standard(
        config.secrets_file.clone(),
        Arc::clone(&store),
        Arc::clone(&registry),
    );
    let drive = DriveClient::new(config.drive_api_base.clone(), Arc::new(chain))?;
    let agent: Arc<dyn AgentService> = Arc::new(OpenAiAgent::new(
        OpenAiConfig {
            api_key: config.openai_api_key.clone(),
            api_base: config.openai_api_base.clone(),
            model: config.openai_model.clone(),
            max_tool_rounds: config.agent_max_tool_rounds,
            max_threads: config.agent_max_threads,
        },
        Arc::new(DriveTools::new(drive)),
    )?);

    let state = Arc::new(AppState::with_store(
        config,
        store,
        registry,
        Arc::clone(&agent),
        sink,
    )?);

    agent.start().await?;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("chatdrive listening on {addr}");
    let served = axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await;

    agent.stop().await;
    served?;
    Ok(())
}
