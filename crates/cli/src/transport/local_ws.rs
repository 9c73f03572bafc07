// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The loopback-only surface: a peer-address gate (instead of
//! `X-Laptop-Auth-Key`) plus `/terminal/:id/stream`, a per-session
//! WebSocket mirroring OutputRouter's local broadcast channel. Requires the
//! listener to be served with `into_make_service_with_connect_info::<SocketAddr>()`
//! so `ConnectInfo` is available to both the gate and the handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{epoch_millis, OutboundFrame};
use crate::transport::state::AppState;

pub async fn loopback_only_layer(req: Request<axum::body::Body>, next: Next) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    match peer {
        Some(addr) if addr.ip().is_loopback() => next.run(req).await,
        _ => (StatusCode::FORBIDDEN, "local server only accepts loopback connections").into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamInbound {
    Input { data: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamOutbound {
    Output { session_id: String, data: String, timestamp: u64 },
}

pub async fn terminal_stream_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session_id: String) {
    use futures_util::{SinkExt, StreamExt};
    let (mut sink, mut stream) = socket.split();
    let mut frames = state.output_router.subscribe_local();

    let forward = async {
        loop {
            match frames.recv().await {
                Ok(OutboundFrame::TerminalOutput { session_id: sid, data }) if sid == session_id => {
                    let out = StreamOutbound::Output { session_id: sid, data, timestamp: epoch_millis() };
                    let Ok(text) = serde_json::to_string(&out) else { continue };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session_id, skipped = n, "local terminal stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    let registry = state.registry.clone();
    let receive = async {
        while let Some(Ok(msg)) = stream.next().await {
            let Message::Text(text) = msg else { continue };
            let Ok(StreamInbound::Input { data }) = serde_json::from_str::<StreamInbound>(text.as_str()) else {
                continue;
            };
            let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) else { continue };
            let _ = registry.write_input(&session_id, bytes::Bytes::from(bytes)).await;
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = receive => {}
    }
}

#[cfg(test)]
#[path = "local_ws_tests.rs"]
mod tests;
