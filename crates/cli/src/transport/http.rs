// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST handlers shared verbatim between the tunnel-facing dispatcher and
//! the loopback-only local server — per spec, the two surfaces expose an
//! identical contract, differing only in how each gates access.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ErrorCode, GatewayError};
use crate::model::{Permission, TerminalType};
use crate::transport::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| GatewayError::new(ErrorCode::AuthError, "missing bearer token"))
}

// -- /keys/* --------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct KeysRequest {
    pub device_id: String,
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub stt_key: String,
    pub tts_key: String,
    pub stt_provider: Option<String>,
    pub tts_provider: Option<String>,
    pub stt_endpoint: String,
    pub tts_endpoint: String,
    pub expires_at: u64,
    pub expires_in: u64,
    pub permissions: Vec<Permission>,
}

pub async fn keys_request(State(s): State<Arc<AppState>>, Json(req): Json<KeysRequest>) -> Response {
    let permissions = req
        .permissions
        .iter()
        .filter_map(|p| match p.as_str() {
            "stt" => Some(Permission::Stt),
            "tts" => Some(Permission::Tts),
            _ => None,
        })
        .collect::<Vec<_>>();
    let permissions = if permissions.is_empty() { vec![Permission::Stt, Permission::Tts] } else { permissions };

    let key = s.key_issuer.issue(&req.device_id, req.duration_seconds, permissions.clone()).await;
    Json(KeysResponse {
        stt_key: key.stt_key,
        tts_key: key.tts_key,
        stt_provider: key.stt_provider,
        tts_provider: key.tts_provider,
        stt_endpoint: "/proxy/stt/transcribe".to_owned(),
        tts_endpoint: "/proxy/tts/synthesize".to_owned(),
        expires_at: key.expires_at,
        expires_in: key.expires_at.saturating_sub(key.issued_at),
        permissions,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct KeysRefreshRequest {
    pub device_id: String,
}

pub async fn keys_refresh(State(s): State<Arc<AppState>>, Json(req): Json<KeysRefreshRequest>) -> Response {
    match s.key_issuer.refresh(&req.device_id).await {
        Ok(key) => Json(json!({ "expiresAt": key.expires_at })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct KeysRevokeQuery {
    pub device_id: String,
}

pub async fn keys_revoke(State(s): State<Arc<AppState>>, Query(q): Query<KeysRevokeQuery>) -> Response {
    s.key_issuer.revoke(&q.device_id).await;
    Json(json!({ "revoked": true })).into_response()
}

// -- /terminal/* ------------------------------------------------------------

pub async fn terminal_list(State(s): State<Arc<AppState>>) -> Response {
    Json(s.registry.list().await).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TerminalCreateRequest {
    pub terminal_type: String,
    pub working_dir: Option<String>,
    pub name: Option<String>,
}

pub async fn terminal_create(State(s): State<Arc<AppState>>, Json(req): Json<TerminalCreateRequest>) -> Response {
    let Some(terminal_type) = TerminalType::parse(&req.terminal_type) else {
        return GatewayError::new(ErrorCode::Validation, "terminal_type must be one of regular/cursor_agent/cursor_cli/claude_cli").into_response();
    };
    match s.registry.create(terminal_type, req.working_dir, req.name).await {
        Ok(descriptor) => Json(descriptor).into_response(),
        Err(e) => GatewayError::new(ErrorCode::ProcessError, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub offset: u64,
}

pub async fn terminal_history(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Response {
    match s.registry.get_history(&id, q.offset).await {
        Ok(bytes) => Json(json!({ "data": base64_encode(&bytes) })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub command: String,
}

pub async fn terminal_execute(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ExecuteRequest>,
) -> Response {
    s.output_router.reset_session(&id, &req.command).await;
    match s.orchestrator.execute(&req.command, Some(&id)).await {
        Ok(output) => Json(output).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: Option<String>,
}

pub async fn terminal_rename(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Response {
    match s.registry.rename(&id, req.name).await {
        Ok(()) => Json(json!({ "renamed": true })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub cols: u16,
    pub rows: u16,
}

pub async fn terminal_resize(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ResizeRequest>,
) -> Response {
    match s.registry.resize(&id, req.cols, req.rows).await {
        Ok(()) => Json(json!({ "cols": req.cols, "rows": req.rows })).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn terminal_destroy(State(s): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match s.registry.destroy(&id).await {
        Ok(()) => Json(json!({ "destroyed": id })).into_response(),
        Err(e) => e.into_response(),
    }
}

// -- /agent/execute -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AgentExecuteRequest {
    pub command: String,
    pub session_id: Option<String>,
}

pub async fn agent_execute(State(s): State<Arc<AppState>>, Json(req): Json<AgentExecuteRequest>) -> Response {
    match s.orchestrator.execute(&req.command, req.session_id.as_deref()).await {
        Ok(output) => Json(output).into_response(),
        Err(e) => e.into_response(),
    }
}

// -- /proxy/* -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub audio: String,
    pub language: Option<String>,
}

pub async fn proxy_stt_transcribe(
    State(s): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TranscribeRequest>,
) -> Response {
    let Some(proxy) = &s.proxy else {
        return GatewayError::new(ErrorCode::UpstreamError, "stt not configured").into_response();
    };
    let bearer = match bearer_token(&headers) {
        Ok(t) => t,
        Err(e) => return e.into_response(),
    };
    match proxy.transcribe(bearer, &req.audio, req.language.as_deref()).await {
        Ok(text) => Json(json!({ "text": text })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub language: Option<String>,
}

pub async fn proxy_tts_synthesize(
    State(s): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SynthesizeRequest>,
) -> Response {
    let Some(proxy) = &s.proxy else {
        return GatewayError::new(ErrorCode::UpstreamError, "tts not configured").into_response();
    };
    let bearer = match bearer_token(&headers) {
        Ok(t) => t,
        Err(e) => return e.into_response(),
    };
    match proxy.synthesize(bearer, &req.text, req.voice.as_deref(), req.speed, req.language.as_deref()).await {
        Ok((audio, format)) => Json(json!({ "audio": audio, "format": format })).into_response(),
        Err(e) => e.into_response(),
    }
}

// -- /tunnel-status -----------------------------------------------------------

pub async fn tunnel_status(State(s): State<Arc<AppState>>) -> Response {
    let connected = s.tunnel_outbound.borrow().is_some();
    Json(json!({ "connected": connected })).into_response()
}

// -- /workspace/* -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WorkspaceCloneRequest {
    pub url: String,
    pub name: String,
}

pub async fn workspace_clone(State(s): State<Arc<AppState>>, Json(req): Json<WorkspaceCloneRequest>) -> Response {
    match s.workspace.clone(&req.url, &req.name).await {
        Ok(path) => Json(json!({ "path": path.to_string_lossy() })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceWorktreeRequest {
    pub repo: String,
    pub name: String,
    pub branch: String,
}

pub async fn workspace_worktree(
    State(s): State<Arc<AppState>>,
    Json(req): Json<WorkspaceWorktreeRequest>,
) -> Response {
    match s.workspace.create_worktree(std::path::Path::new(&req.repo), &req.name, &req.branch).await {
        Ok(path) => Json(json!({ "path": path.to_string_lossy() })).into_response(),
        Err(e) => e.into_response(),
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
