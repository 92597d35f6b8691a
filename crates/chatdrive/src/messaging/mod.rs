// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound messages to senders.

pub mod twilio;

use async_trait::async_trait;

use crate::identity::Identity;

/// Delivers a text message to a sender on the messaging channel.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, to: &Identity, body: &str) -> anyhow::Result<()>;
}

/// Sink used when no messaging provider is configured: logs and drops.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn send(&self, to: &Identity, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, len = body.len(), "outbound message (no provider configured)");
        tracing::debug!(to = %to, body, "outbound message body");
        Ok(())
    }
}
