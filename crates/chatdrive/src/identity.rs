// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sender identities and per-day conversation thread keys.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Channel prefix Twilio puts in front of WhatsApp addresses.
const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Normalized sender address used as the authentication subject.
///
/// Normalization drops the channel prefix, surrounding whitespace, and any
/// leading `+`, so `"whatsapp:+1234"`, `" +1234 "` and `"1234"` are the same
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Normalize a raw sender address. Returns `None` when nothing remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let without_channel = trimmed.strip_prefix(WHATSAPP_PREFIX).unwrap_or(trimmed);
        let normalized = without_channel.trim().trim_start_matches('+').trim();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Twilio WhatsApp address for this identity (`whatsapp:+<number>`).
    pub fn whatsapp_address(&self) -> String {
        format!("{WHATSAPP_PREFIX}+{}", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates every message from one sender on one calendar day into a
/// single agent conversation. Recomputed per message, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadKey(String);

impl ThreadKey {
    pub fn for_day(identity: &Identity, day: NaiveDate) -> Self {
        Self(format!("{}_{}", identity.as_str(), day.format("%Y-%m-%d")))
    }

    /// Thread key for the current local date.
    pub fn today(identity: &Identity) -> Self {
        Self::for_day(identity, chrono::Local::now().date_naive())
    }

    /// Caller-chosen thread id, as accepted by the chat API.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
