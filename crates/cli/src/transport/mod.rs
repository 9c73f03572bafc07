// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router assembly and the shared error envelope. `build_router` produces
//! the bare REST+WS surface; `wrap_tunnel` and `wrap_local` apply the two
//! different authority gates described in §4.8 and §6 — the tunnel-facing
//! mount trusts `X-Laptop-Auth-Key`, the loopback mount trusts the peer
//! address instead.

pub mod auth;
pub mod http;
pub mod local_ws;
pub mod state;
pub mod ws;

pub use state::AppState;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::{ErrorCode, GatewayError};

/// Top-level error response envelope shared across HTTP and WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body containing a machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorCode {
    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body(message) }))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: ErrorBody { code: self.code.as_str().to_owned(), message: self.message } };
        (status, Json(body)).into_response()
    }
}

/// The REST+WS surface shared by both mounts, before state is attached.
fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/keys/request", post(http::keys_request))
        .route("/keys/refresh", post(http::keys_refresh))
        .route("/keys/revoke", delete(http::keys_revoke))
        .route("/terminal/list", get(http::terminal_list))
        .route("/terminal/create", post(http::terminal_create))
        .route("/terminal/{id}/history", get(http::terminal_history))
        .route("/terminal/{id}/execute", post(http::terminal_execute))
        .route("/terminal/{id}/rename", post(http::terminal_rename))
        .route("/terminal/{id}/resize", post(http::terminal_resize))
        .route("/terminal/{id}", delete(http::terminal_destroy))
        .route("/agent/execute", post(http::agent_execute))
        .route("/agent/ws", get(ws::agent_ws_handler))
        .route("/proxy/stt/transcribe", post(http::proxy_stt_transcribe))
        .route("/proxy/tts/synthesize", post(http::proxy_tts_synthesize))
        .route("/tunnel-status", get(http::tunnel_status))
        .route("/workspace/clone", post(http::workspace_clone))
        .route("/workspace/worktree", post(http::workspace_worktree))
}

/// The router dispatched by [`crate::tunnel_client::TunnelClient`], gated by
/// `X-Laptop-Auth-Key` per §4.8's authority-boundary rule.
pub fn build_tunnel_router(state: Arc<AppState>) -> Router {
    routes()
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The loopback-only router served by LocalHTTPServer: the identical REST
/// surface plus `/terminal/:id/stream`, gated by peer address instead of a
/// shared secret.
pub fn build_local_router(state: Arc<AppState>) -> Router {
    routes()
        .route("/terminal/{id}/stream", get(local_ws::terminal_stream_handler))
        .layer(middleware::from_fn(local_ws::loopback_only_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
