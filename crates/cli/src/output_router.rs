// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OutputRouter: for every `(session, bytes)` the registry emits, decides
//! destinations — terminal display, recording stream, chat messages — and
//! drives server-side TTS on headless completion. Holds a non-owning,
//! swappable handle to TunnelClient's outbound queue (nil during
//! reconnection) and never holds a handle back to the registry beyond the
//! subscription it was given; this is the subscriber side of the
//! Router/Registry relationship.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::warn;

use crate::headless_parser;
use crate::model::{epoch_millis, OutboundFrame, TerminalType, TtsSettings};
use crate::proxy::ProxyLayer;
use crate::recording::RecordingState;
use crate::screen::Screen;
use crate::session_registry::SessionRegistry;

/// Bounded outbound queue depth to the tunnel; producers block on full.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

#[derive(Default)]
struct PerSessionState {
    screen: Option<Screen>,
    recording: RecordingState,
}

pub struct OutputRouter {
    registry: Arc<SessionRegistry>,
    proxy: Option<Arc<ProxyLayer>>,
    outbound: watch::Receiver<Option<mpsc::Sender<OutboundFrame>>>,
    local_tx: tokio::sync::broadcast::Sender<OutboundFrame>,
    state: Mutex<HashMap<String, PerSessionState>>,
    tts_settings: Mutex<HashMap<String, TtsSettings>>,
}

impl OutputRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        proxy: Option<Arc<ProxyLayer>>,
        outbound: watch::Receiver<Option<mpsc::Sender<OutboundFrame>>>,
    ) -> Arc<Self> {
        let (local_tx, _) = tokio::sync::broadcast::channel(OUTBOUND_QUEUE_DEPTH);
        Arc::new(Self {
            registry,
            proxy,
            outbound,
            local_tx,
            state: Mutex::new(HashMap::new()),
            tts_settings: Mutex::new(HashMap::new()),
        })
    }

    pub fn subscribe_local(&self) -> tokio::sync::broadcast::Receiver<OutboundFrame> {
        self.local_tx.subscribe()
    }

    pub async fn set_tts_settings(&self, session_id: &str, settings: TtsSettings) {
        self.tts_settings.lock().await.insert(session_id.to_owned(), settings);
    }

    /// Clear a session's transient recording/screen state — called when a
    /// new command is submitted on that session.
    pub async fn reset_session(&self, session_id: &str, command: &str) {
        let mut state = self.state.lock().await;
        let entry = state.entry(session_id.to_owned()).or_default();
        entry.recording.set_last_command(command);
    }

    /// Spawn the task that drains the registry's global output bus for
    /// the lifetime of the process.
    pub fn spawn(self: Arc<Self>) {
        let mut rx = self.registry.subscribe_output();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(chunk) => self.route(chunk.session_id, chunk.bytes).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "output router lagged behind global output bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn route(&self, session_id: String, bytes: bytes::Bytes) {
        let Some(descriptor) = self.registry.get_descriptor(&session_id).await else { return };

        self.emit(OutboundFrame::TerminalOutput {
            session_id: session_id.clone(),
            data: base64_encode(&bytes),
        })
        .await;

        if descriptor.terminal_type.is_headless() {
            self.route_headless(&session_id, &bytes).await;
        } else if descriptor.terminal_type == TerminalType::CursorAgent {
            self.route_screen_recorded(&session_id, descriptor.cols, descriptor.rows, &bytes).await;
        }
    }

    async fn route_screen_recorded(&self, session_id: &str, cols: u16, rows: u16, bytes: &[u8]) {
        let raw_filtered_lines;
        let full_screen;
        {
            let mut state = self.state.lock().await;
            let entry = state.entry(session_id.to_owned()).or_default();
            let screen = entry.screen.get_or_insert_with(|| Screen::new(cols, rows));
            screen.feed(bytes);
            full_screen = screen.snapshot().lines;
            raw_filtered_lines = String::from_utf8_lossy(bytes).into_owned();
        }

        let output = {
            let mut state = self.state.lock().await;
            let entry = state.entry(session_id.to_owned()).or_default();
            entry.recording.process_output(&raw_filtered_lines, &full_screen)
        };

        if let Some(output) = output {
            self.emit(OutboundFrame::RecordingOutput {
                session_id: session_id.to_owned(),
                text: output.full_text,
                delta: output.delta,
                raw: output.raw,
                timestamp: epoch_millis(),
                is_complete: false,
                is_tts_ready: None,
            })
            .await;
        }
    }

    async fn route_headless(&self, session_id: &str, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        for line in text.lines() {
            let Some(parsed) = headless_parser::parse_line(line) else { continue };

            if let Some(message) = parsed.message.clone() {
                if matches!(message.kind, crate::model::ChatMessageKind::Assistant) {
                    let mut state = self.state.lock().await;
                    let entry = state.entry(session_id.to_owned()).or_default();
                    entry.recording.accumulate_headless_text(&message.content);
                }
                self.emit(OutboundFrame::ChatMessage {
                    session_id: session_id.to_owned(),
                    message,
                    timestamp: epoch_millis(),
                })
                .await;
            }

            if parsed.is_complete {
                self.complete_headless(session_id).await;
            }
        }
    }

    async fn complete_headless(&self, session_id: &str) {
        let full_text = {
            let mut state = self.state.lock().await;
            let entry = state.entry(session_id.to_owned()).or_default();
            entry.recording.complete_headless()
        };

        let settings = self.tts_settings.lock().await.remove(session_id);
        if let (Some(settings), Some(proxy)) = (settings.as_ref(), self.proxy.as_ref()) {
            if settings.enabled {
                match proxy.synthesize_direct(&full_text, None, settings.speed, settings.language.as_deref()).await {
                    Ok((audio, format)) => {
                        self.emit(OutboundFrame::TtsAudio {
                            session_id: session_id.to_owned(),
                            audio,
                            format,
                            text: full_text.clone(),
                            timestamp: epoch_millis(),
                        })
                        .await;
                        return;
                    }
                    Err(e) => warn!(session_id, err = %e, "tts synthesis failed, falling back to text"),
                }
            }
        }

        self.emit(OutboundFrame::RecordingOutput {
            session_id: session_id.to_owned(),
            text: full_text.clone(),
            delta: full_text,
            raw: String::new(),
            timestamp: epoch_millis(),
            is_complete: true,
            is_tts_ready: None,
        })
        .await;
    }

    async fn emit(&self, frame: OutboundFrame) {
        let _ = self.local_tx.send(frame.clone());
        let sender = self.outbound.borrow().clone();
        if let Some(sender) = sender {
            if sender.send(frame).await.is_err() {
                warn!("outbound tunnel queue closed");
            }
        }
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
#[path = "output_router_tests.rs"]
mod tests;
