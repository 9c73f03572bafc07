// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! StateStore: single-writer JSON persistence for `tunnel.json` and
//! `sessions.json` under the state directory. Writes are atomic
//! (write-to-temp + rename); reads tolerate a missing file; a corrupt
//! file is rotated aside and the caller proceeds with empty state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::model::{epoch_secs, SessionDescriptor, TunnelIdentity};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PersistedSessions {
    sessions: Vec<SessionDescriptor>,
}

/// Owns the on-disk `tunnel.json` / `sessions.json` files. Writes are
/// serialized through an internal mutex so callers never race a rename.
pub struct StateStore {
    tunnel_path: PathBuf,
    sessions_path: PathBuf,
    write_lock: Mutex<()>,
}

impl StateStore {
    pub fn new(tunnel_path: PathBuf, sessions_path: PathBuf) -> Self {
        Self { tunnel_path, sessions_path, write_lock: Mutex::new(()) }
    }

    pub async fn load_tunnel_identity(&self) -> Option<TunnelIdentity> {
        load_json(&self.tunnel_path).await
    }

    pub async fn save_tunnel_identity(&self, identity: &TunnelIdentity) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.tunnel_path, identity).await
    }

    pub async fn load_sessions(&self) -> Vec<SessionDescriptor> {
        load_json::<PersistedSessions>(&self.sessions_path).await.unwrap_or_default().sessions
    }

    pub async fn save_sessions(&self, sessions: &[SessionDescriptor]) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.sessions_path, &PersistedSessions { sessions: sessions.to_vec() }).await
    }
}

/// Read and parse a JSON file. Missing file ⇒ `None`. Corrupt file ⇒
/// rotated to `.corrupt-<epoch>` and `None` returned, per `CorruptedState`.
async fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), err = %e, "state file unreadable");
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), err = %e, "corrupted state file, rotating aside");
            let rotated = path.with_extension(format!("corrupt-{}", epoch_secs()));
            if let Err(rename_err) = tokio::fs::rename(path, &rotated).await {
                warn!(path = %path.display(), err = %rename_err, "failed to rotate corrupt state file");
            }
            None
        }
    }
}

async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
#[path = "state_store_tests.rs"]
mod tests;
