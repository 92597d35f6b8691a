// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: load/save a JSON file with atomic writes.

use std::io::ErrorKind;
use std::path::Path;

use crate::credential::{CleanupWarning, Credential};

/// Load a credential from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<Credential> {
    let contents = std::fs::read_to_string(path)?;
    let cred: Credential = serde_json::from_str(&contents)?;
    Ok(cred)
}

/// Save a credential to a JSON file atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never
/// share a `.tmp` file.
pub fn save(path: &Path, cred: &Credential) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(cred)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Remove `path`. A missing file is not an error.
pub fn remove_if_exists(path: &Path) -> Result<(), CleanupWarning> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CleanupWarning { path: path.to_path_buf(), error: e.to_string() }),
    }
}
