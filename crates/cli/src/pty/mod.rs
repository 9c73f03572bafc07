// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTYSession: one PTY plus its child process, with a bounded stdin queue,
//! a history ring, and a fan-out of output bytes to listeners.

pub mod nbio;
pub mod spawn;

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::model::SessionDescriptor;
use crate::ring::RingBuffer;

/// Child process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// How long `destroy()` waits after SIGTERM before escalating to SIGKILL.
pub const TERMINATE_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Depth of the bounded stdin queue. Writers observe backpressure once full.
const STDIN_QUEUE_DEPTH: usize = 64;
/// Depth of the per-session output fan-out channel.
const OUTPUT_CHANNEL_DEPTH: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PtyState {
    Spawning = 0,
    Running = 1,
    Terminating = 2,
    Dead = 3,
}

impl PtyState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Spawning,
            1 => Self::Running,
            2 => Self::Terminating,
            _ => Self::Dead,
        }
    }
}

/// One PTY-backed child process. Output bytes are routed unconditionally
/// while `Running`; late output after `Terminating` is discarded.
pub struct PtySession {
    pub descriptor: SyncMutex<SessionDescriptor>,
    state: AtomicU8,
    child_pid: AtomicU32,
    history: SyncMutex<RingBuffer>,
    output_tx: broadcast::Sender<Bytes>,
    stdin_tx: mpsc::Sender<Bytes>,
    exit_tx: tokio::sync::watch::Sender<Option<ExitStatus>>,
    exit_rx: tokio::sync::watch::Receiver<Option<ExitStatus>>,
    backend: Arc<spawn::NativePty>,
}

impl PtySession {
    /// Spawn the child process described by `descriptor` and start its I/O
    /// pumps. Returns once the PTY is in the `Running` state.
    pub fn spawn(descriptor: SessionDescriptor, ring_size: usize) -> anyhow::Result<Arc<Self>> {
        let (program, args) = descriptor.terminal_type.spawn_command();
        let backend = Arc::new(spawn::NativePty::spawn(
            &program,
            &args,
            descriptor.cols,
            descriptor.rows,
        )?);
        let child_pid = backend.child_pid();

        let (output_tx, _) = broadcast::channel(OUTPUT_CHANNEL_DEPTH);
        let (stdin_tx, stdin_rx) = mpsc::channel(STDIN_QUEUE_DEPTH);
        let (exit_tx, exit_rx) = tokio::sync::watch::channel(None);

        let session = Arc::new(Self {
            descriptor: SyncMutex::new(descriptor),
            state: AtomicU8::new(PtyState::Running as u8),
            child_pid: AtomicU32::new(child_pid),
            history: SyncMutex::new(RingBuffer::new(ring_size)),
            output_tx,
            stdin_tx,
            exit_tx,
            exit_rx,
            backend: backend.clone(),
        });

        let pump_session = session.clone();
        tokio::spawn(async move {
            let (pump_tx, mut pump_rx) = mpsc::channel::<Bytes>(256);
            let run_fut = backend.run(pump_tx, stdin_rx);
            tokio::pin!(run_fut);

            let result = loop {
                tokio::select! {
                    biased;
                    chunk = pump_rx.recv() => {
                        match chunk {
                            Some(bytes) => pump_session.route_output(bytes),
                            None => continue,
                        }
                    }
                    result = &mut run_fut => break result,
                }
            };

            match result {
                Ok(status) => {
                    info!(pid = pump_session.child_pid(), ?status, "pty child exited");
                    pump_session.state.store(PtyState::Dead as u8, Ordering::SeqCst);
                    let _ = pump_session.exit_tx.send(Some(status));
                }
                Err(e) => {
                    warn!(pid = pump_session.child_pid(), err = %e, "pty pump failed");
                    pump_session.state.store(PtyState::Dead as u8, Ordering::SeqCst);
                    let _ = pump_session.exit_tx.send(Some(ExitStatus { code: None, signal: None }));
                }
            }
        });

        Ok(session)
    }

    fn route_output(&self, bytes: Bytes) {
        if self.state() != PtyState::Running {
            return;
        }
        self.history.lock().write(&bytes);
        let _ = self.output_tx.send(bytes);
    }

    pub fn state(&self) -> PtyState {
        PtyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn child_pid(&self) -> u32 {
        self.child_pid.load(Ordering::SeqCst)
    }

    /// Enqueue bytes to the child's stdin. Backpressures once the bounded
    /// queue (depth 64) is full.
    pub async fn write(&self, data: Bytes) -> Result<(), crate::error::ErrorCode> {
        if self.state() != PtyState::Running {
            return Err(crate::error::ErrorCode::NotFound);
        }
        self.stdin_tx.send(data).await.map_err(|_| crate::error::ErrorCode::ProcessError)
    }

    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        {
            let mut descriptor = self.descriptor.lock();
            descriptor.cols = cols;
            descriptor.rows = rows;
        }
        self.backend.resize(cols, rows)
    }

    /// Snapshot of the history ring, from the given byte offset (0 = all
    /// retained history).
    pub fn history_from(&self, offset: u64) -> Vec<u8> {
        let ring = self.history.lock();
        let (a, b) = ring.read_from(offset).unwrap_or((&[], &[]));
        [a, b].concat()
    }

    pub fn history_total_written(&self) -> u64 {
        self.history.lock().total_written()
    }

    /// Subscribe to this session's output stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.output_tx.subscribe()
    }

    /// Resolves once the child process has exited.
    pub async fn wait_exit(&self) -> ExitStatus {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(status) = *rx.borrow() {
                return status;
            }
            if rx.changed().await.is_err() {
                return ExitStatus { code: None, signal: None };
            }
        }
    }

    /// SIGTERM, wait up to [`TERMINATE_GRACE`], SIGKILL, notify waiters.
    pub async fn destroy(&self) {
        if self.state() == PtyState::Dead {
            return;
        }
        self.state.store(PtyState::Terminating as u8, Ordering::SeqCst);
        let status = self.backend.terminate(TERMINATE_GRACE).await.unwrap_or(ExitStatus {
            code: None,
            signal: None,
        });
        self.state.store(PtyState::Dead as u8, Ordering::SeqCst);
        let _ = self.exit_tx.send(Some(status));
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
