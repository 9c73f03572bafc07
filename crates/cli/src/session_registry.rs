// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SessionRegistry: owns the `sessionId -> PTYSession` map, persists
//! descriptors through StateStore, and fans output/input/destruction out
//! to subscribers. The registry knows nothing about OutputRouter; per the
//! Router-as-subscriber design, Router holds a handle to the registry's
//! broadcast channels, never the reverse.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, GatewayError};
use crate::model::{epoch_secs, SessionDescriptor, TerminalType};
use crate::pty::{PtySession, PtyState};
use crate::state_store::StateStore;

/// Default terminal dimensions for newly created sessions.
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Depth of the global fan-out channels. Generous relative to the
/// per-session output channel since it aggregates across all sessions.
const GLOBAL_CHANNEL_DEPTH: usize = 4096;

struct Entry {
    descriptor: SessionDescriptor,
    pty: Option<Arc<PtySession>>,
}

/// `(session_id, bytes)` pair observed on the global output or input bus.
#[derive(Debug, Clone)]
pub struct SessionBytes {
    pub session_id: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDestroyed {
    pub session_id: String,
}

pub struct SessionRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    state_store: Arc<StateStore>,
    ring_size: usize,
    output_tx: broadcast::Sender<SessionBytes>,
    input_tx: broadcast::Sender<SessionBytes>,
    destroyed_tx: broadcast::Sender<SessionDestroyed>,
}

impl SessionRegistry {
    pub fn new(state_store: Arc<StateStore>, ring_size: usize) -> Arc<Self> {
        let (output_tx, _) = broadcast::channel(GLOBAL_CHANNEL_DEPTH);
        let (input_tx, _) = broadcast::channel(GLOBAL_CHANNEL_DEPTH);
        let (destroyed_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            state_store,
            ring_size,
            output_tx,
            input_tx,
            destroyed_tx,
        })
    }

    /// Reload persisted descriptors. PTYs are not spawned here; they
    /// materialize lazily on first use.
    pub async fn restore_sessions(&self) {
        let descriptors = self.state_store.load_sessions().await;
        let mut entries = self.entries.write().await;
        for descriptor in descriptors {
            info!(session_id = %descriptor.session_id, "restoring session descriptor");
            entries.insert(descriptor.session_id.clone(), Entry { descriptor, pty: None });
        }
    }

    pub async fn create(
        self: &Arc<Self>,
        terminal_type: TerminalType,
        working_dir: Option<String>,
        name: Option<String>,
    ) -> anyhow::Result<SessionDescriptor> {
        let descriptor = SessionDescriptor {
            session_id: Uuid::new_v4().to_string(),
            terminal_type,
            working_dir,
            name,
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            created_at: epoch_secs(),
        };

        let pty = PtySession::spawn(descriptor.clone(), self.ring_size)?;
        self.watch(descriptor.session_id.clone(), pty.clone());

        {
            let mut entries = self.entries.write().await;
            entries.insert(descriptor.session_id.clone(), Entry { descriptor: descriptor.clone(), pty: Some(pty) });
        }
        self.persist().await;
        Ok(descriptor)
    }

    pub async fn list(&self) -> Vec<SessionDescriptor> {
        self.entries.read().await.values().map(|e| e.descriptor.clone()).collect()
    }

    pub async fn get_descriptor(&self, session_id: &str) -> Option<SessionDescriptor> {
        self.entries.read().await.get(session_id).map(|e| e.descriptor.clone())
    }

    /// Return the running PTY for `session_id`, spawning it lazily from
    /// its persisted descriptor if it hasn't been touched since restore.
    pub async fn ensure_running(self: &Arc<Self>, session_id: &str) -> Result<Arc<PtySession>, GatewayError> {
        {
            let entries = self.entries.read().await;
            let entry = entries.get(session_id).ok_or_else(not_found)?;
            if let Some(pty) = &entry.pty {
                if pty.state() != PtyState::Dead {
                    return Ok(pty.clone());
                }
            }
        }

        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(session_id).ok_or_else(not_found)?;
        if let Some(pty) = &entry.pty {
            if pty.state() != PtyState::Dead {
                return Ok(pty.clone());
            }
        }
        let pty = PtySession::spawn(entry.descriptor.clone(), self.ring_size)
            .map_err(|e| GatewayError::new(ErrorCode::ProcessError, e.to_string()))?;
        entry.pty = Some(pty.clone());
        self.watch(session_id.to_owned(), pty.clone());
        Ok(pty)
    }

    pub async fn rename(&self, session_id: &str, name: Option<String>) -> Result<(), GatewayError> {
        {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(session_id).ok_or_else(not_found)?;
            entry.descriptor.name = name;
        }
        self.persist().await;
        Ok(())
    }

    pub async fn resize(self: &Arc<Self>, session_id: &str, cols: u16, rows: u16) -> Result<(), GatewayError> {
        {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(session_id).ok_or_else(not_found)?;
            entry.descriptor.cols = cols;
            entry.descriptor.rows = rows;
        }
        if let Ok(pty) = self.ensure_running(session_id).await {
            pty.resize(cols, rows).map_err(|e| GatewayError::new(ErrorCode::ProcessError, e.to_string()))?;
        }
        self.persist().await;
        Ok(())
    }

    pub async fn destroy(&self, session_id: &str) -> Result<(), GatewayError> {
        let pty = {
            let mut entries = self.entries.write().await;
            let entry = entries.remove(session_id).ok_or_else(not_found)?;
            entry.pty
        };
        if let Some(pty) = pty {
            pty.destroy().await;
        }
        self.persist().await;
        let _ = self.destroyed_tx.send(SessionDestroyed { session_id: session_id.to_owned() });
        Ok(())
    }

    pub async fn get_history(&self, session_id: &str, offset: u64) -> Result<Vec<u8>, GatewayError> {
        let entries = self.entries.read().await;
        let entry = entries.get(session_id).ok_or_else(not_found)?;
        Ok(entry.pty.as_ref().map(|pty| pty.history_from(offset)).unwrap_or_default())
    }

    /// Write to the child's stdin without waiting for a reply.
    pub async fn execute_command(self: &Arc<Self>, session_id: &str, command: &str) -> Result<(), GatewayError> {
        let mut data = command.as_bytes().to_vec();
        data.push(b'\n');
        self.write_input(session_id, Bytes::from(data)).await
    }

    pub async fn write_input(self: &Arc<Self>, session_id: &str, bytes: Bytes) -> Result<(), GatewayError> {
        let pty = self.ensure_running(session_id).await?;
        let _ = self.input_tx.send(SessionBytes { session_id: session_id.to_owned(), bytes: bytes.clone() });
        pty.write(bytes).await.map_err(|code| GatewayError::new(code, "pty stdin closed".to_owned()))
    }

    pub fn subscribe_output(&self) -> broadcast::Receiver<SessionBytes> {
        self.output_tx.subscribe()
    }

    pub fn subscribe_input(&self) -> broadcast::Receiver<SessionBytes> {
        self.input_tx.subscribe()
    }

    pub fn subscribe_destroyed(&self) -> broadcast::Receiver<SessionDestroyed> {
        self.destroyed_tx.subscribe()
    }

    /// Spawn a task that forwards a session's PTY output onto the global
    /// bus and reacts to unsolicited child exit (crash, not `destroy()`).
    fn watch(self: &Arc<Self>, session_id: String, pty: Arc<PtySession>) {
        let registry = self.clone();
        let mut rx = pty.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(bytes) => {
                        let _ = registry
                            .output_tx
                            .send(SessionBytes { session_id: session_id.clone(), bytes });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(session_id, skipped = n, "global output listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let registry = self.clone();
        let watched_id = session_id;
        tokio::spawn(async move {
            pty.wait_exit().await;
            let still_tracked = {
                let entries = registry.entries.read().await;
                entries.contains_key(&watched_id)
            };
            if still_tracked {
                let _ = registry.destroyed_tx.send(SessionDestroyed { session_id: watched_id });
            }
        });
    }

    async fn persist(&self) {
        let snapshot = self.list().await;
        if let Err(e) = self.state_store.save_sessions(&snapshot).await {
            warn!(err = %e, "failed to persist session descriptors");
        }
    }
}

fn not_found() -> GatewayError {
    GatewayError::new(ErrorCode::NotFound, "session not found".to_owned())
}

#[cfg(test)]
#[path = "session_registry_tests.rs"]
mod tests;
