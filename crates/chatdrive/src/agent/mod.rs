// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The assistant that answers sender messages.

pub mod openai;
pub mod tools;

use async_trait::async_trait;

use crate::identity::ThreadKey;

/// Fallback replies. Agent failures are turned into one of these strings
/// instead of an error so the sender always hears back.
pub const NOT_INITIALIZED_REPLY: &str = "Agent is not initialized.";
pub const EMPTY_REPLY: &str = "Couldn't generate a proper response.";

/// Conversational agent with per-thread memory.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Prepare tool connections. Called once before serving.
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release tool connections. Called once on shutdown.
    async fn stop(&self) {}

    /// Produce a reply for `message` in `thread`. Never fails: errors are
    /// reported to the sender as text.
    async fn process(&self, message: &str, thread: &ThreadKey) -> String;
}
