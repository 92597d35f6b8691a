// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-slot register of the currently authenticated sender.
//!
//! Only one identity is active process-wide. `set_active` overwrites the
//! slot, so a second sender completing the consent flow silently
//! de-authenticates the first. Concurrent writers race last-writer-wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::identity::Identity;

/// File name of the active-identity slot inside the data directory.
pub const ACTIVE_USER_FILE: &str = "active_user.txt";

pub struct ActiveUserRegistry {
    path: PathBuf,
}

impl ActiveUserRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Registry stored at `<data_dir>/active_user.txt`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(ACTIVE_USER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the slot with `identity`.
    pub fn set_active(&self, identity: &Identity) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, format!("{}\n", identity.as_str()))?;
        tracing::info!(identity = %identity, "active user set");
        Ok(())
    }

    /// The identity currently holding the slot, if any.
    ///
    /// Any read failure counts as "no active user".
    pub fn active(&self) -> Option<Identity> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::error!(path = %self.path.display(), err = %e, "failed to read active user");
                return None;
            }
        };
        contents.lines().find_map(Identity::parse)
    }

    /// True iff the stored identity equals `identity` after normalization.
    pub fn is_active(&self, identity: &Identity) -> bool {
        self.active().is_some_and(|stored| &stored == identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> anyhow::Result<Identity> {
        Identity::parse(raw).ok_or_else(|| anyhow::anyhow!("blank identity"))
    }

    #[test]
    fn empty_registry_has_no_active_user() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = ActiveUserRegistry::in_dir(dir.path());
        assert!(!registry.is_active(&id("123")?));
        Ok(())
    }

    #[test]
    fn set_active_normalizes_plus() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = ActiveUserRegistry::in_dir(dir.path());
        registry.set_active(&id("+123")?)?;
        assert!(registry.is_active(&id("123")?));
        assert!(registry.is_active(&id(" +123 ")?));
        Ok(())
    }

    #[test]
    fn second_sender_overwrites_first() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = ActiveUserRegistry::in_dir(dir.path());
        let a = id("111")?;
        let b = id("222")?;
        registry.set_active(&a)?;
        registry.set_active(&b)?;
        assert!(!registry.is_active(&a));
        assert!(registry.is_active(&b));
        assert_eq!(registry.active(), Some(b));
        Ok(())
    }

    #[test]
    fn hand_written_slot_with_plus_still_matches() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let registry = ActiveUserRegistry::in_dir(dir.path());
        std::fs::write(registry.path(), "  +4455\n")?;
        assert!(registry.is_active(&id("4455")?));
        Ok(())
    }

    #[test]
    fn unreadable_slot_reports_inactive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // A directory where the file should be makes the read fail.
        std::fs::create_dir(dir.path().join(ACTIVE_USER_FILE))?;
        let registry = ActiveUserRegistry::in_dir(dir.path());
        assert!(!registry.is_active(&id("123")?));
        Ok(())
    }
}
