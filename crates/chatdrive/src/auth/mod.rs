// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sender authentication: the per-message gate and the consent broker that
//! turns a provider callback into a stored credential.

pub mod consent;
pub mod gate;

pub use consent::{ConsentBroker, PendingRequest};
pub use gate::{AuthDecision, AuthGate};
