// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/agent/ws`: Supervisor mode's dedicated websocket. Accepts text or
//! audio turns and streams `SupervisorFrame`s back — `transcription` (audio
//! only), then `chunk`* as the LLM streams, then `complete`. `reset_context`
//! clears the process-wide conversation history without closing the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::agent_orchestrator::SupervisorFrame;
use crate::transport::state::AppState;

const FRAME_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AgentWsInbound {
    Text { text: String },
    Audio {
        audio: String,
        #[serde(default)]
        language: Option<String>,
    },
    ResetContext,
}

pub async fn agent_ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    use futures_util::{SinkExt, StreamExt};
    let (mut sink, mut stream) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<SupervisorFrame>(FRAME_QUEUE_DEPTH);

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else { continue };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let inbound = match serde_json::from_str::<AgentWsInbound>(text.as_str()) {
            Ok(inbound) => inbound,
            Err(e) => {
                let _ = frame_tx.send(SupervisorFrame::Error { message: format!("malformed frame: {e}") }).await;
                continue;
            }
        };

        match inbound {
            AgentWsInbound::Text { text } => {
                state.orchestrator.handle_text_turn(text, &frame_tx).await;
            }
            AgentWsInbound::Audio { audio, language } => {
                state.orchestrator.handle_audio_turn(&audio, language.as_deref(), &frame_tx).await;
            }
            AgentWsInbound::ResetContext => {
                state.orchestrator.reset_context().await;
            }
        }
    }

    writer.abort();
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
