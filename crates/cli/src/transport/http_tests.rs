// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use tokio::sync::watch;

use crate::agent_orchestrator::{AgentOrchestrator, LlmConfig};
use crate::key_issuer::KeyIssuer;
use crate::output_router::OutputRouter;
use crate::session_registry::SessionRegistry;
use crate::state_store::StateStore;
use crate::transport::state::AppState;
use crate::transport::{build_local_router, build_tunnel_router};
use crate::workspace::WorkspaceManager;

async fn test_state() -> Arc<AppState> {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::new(dir.path().join("tunnel.json"), dir.path().join("sessions.json")));
    std::mem::forget(dir);
    let registry = SessionRegistry::new(store, 4096);
    let key_issuer = Arc::new(KeyIssuer::new(None, None));
    let workspace = Arc::new(WorkspaceManager::new(PathBuf::from("/tmp")));
    let orchestrator =
        Arc::new(AgentOrchestrator::new(LlmConfig::default(), None, registry.clone(), workspace.clone()));
    let (_tx, outbound_rx) = watch::channel(None);
    let output_router = OutputRouter::new(registry.clone(), None, outbound_rx.clone());
    Arc::new(AppState {
        registry,
        key_issuer,
        proxy: None,
        orchestrator,
        workspace,
        output_router,
        laptop_auth_key: "secret".to_owned(),
        tunnel_outbound: outbound_rx,
    })
}

#[tokio::test]
async fn tunnel_router_rejects_missing_laptop_key() {
    let state = test_state().await;
    let app = build_tunnel_router(state);
    let server = axum_test::TestServer::new(app).unwrap();

    let resp = server.get("/terminal/list").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tunnel_router_accepts_valid_laptop_key() {
    let state = test_state().await;
    let app = build_tunnel_router(state);
    let server = axum_test::TestServer::new(app).unwrap();

    let resp = server.get("/terminal/list").add_header("x-laptop-auth-key", "secret").await;
    resp.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn keys_request_issues_both_keys() {
    let state = test_state().await;
    let app = build_tunnel_router(state);
    let server = axum_test::TestServer::new(app).unwrap();

    let resp = server
        .post("/keys/request")
        .add_header("x-laptop-auth-key", "secret")
        .json(&serde_json::json!({ "device_id": "device-1" }))
        .await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["stt_key"].as_str().unwrap().len(), 64);
    assert_eq!(body["tts_key"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn terminal_create_rejects_unknown_terminal_type() {
    let state = test_state().await;
    let app = build_tunnel_router(state);
    let server = axum_test::TestServer::new(app).unwrap();

    let resp = server
        .post("/terminal/create")
        .add_header("x-laptop-auth-key", "secret")
        .json(&serde_json::json!({ "terminal_type": "not_a_type" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tunnel_status_reports_disconnected_by_default() {
    let state = test_state().await;
    let app = build_tunnel_router(state);
    let server = axum_test::TestServer::new(app).unwrap();

    let resp = server.get("/tunnel-status").add_header("x-laptop-auth-key", "secret").await;
    let body: serde_json::Value = resp.json();
    assert_eq!(body["connected"], false);
}

#[tokio::test]
async fn local_router_rejects_non_loopback_peers() {
    let state = test_state().await;
    let app = build_local_router(state);
    let server = axum_test::TestServer::new(app).unwrap();

    // axum-test drives requests without a real TCP peer, so ConnectInfo is
    // absent and the loopback gate rejects the same way a genuine
    // non-loopback peer would.
    let resp = server.get("/terminal/list").await;
    resp.assert_status(StatusCode::FORBIDDEN);
}
