// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state injected into the HTTP/WebSocket router. One
//! instance is constructed by Supervisor at startup and handed to both the
//! tunnel-facing dispatcher (gated by `laptop_auth_key`) and the
//! loopback-only local server (gated by peer address instead).

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::agent_orchestrator::AgentOrchestrator;
use crate::key_issuer::KeyIssuer;
use crate::model::OutboundFrame;
use crate::output_router::OutputRouter;
use crate::proxy::ProxyLayer;
use crate::session_registry::SessionRegistry;
use crate::workspace::WorkspaceManager;

pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub key_issuer: Arc<KeyIssuer>,
    pub proxy: Option<Arc<ProxyLayer>>,
    pub orchestrator: Arc<AgentOrchestrator>,
    pub workspace: Arc<WorkspaceManager>,
    pub output_router: Arc<OutputRouter>,
    pub laptop_auth_key: String,
    /// `Some(sender)` while the outbound tunnel link is up; mirrors the
    /// handle OutputRouter holds, consumed by `GET /tunnel-status`.
    pub tunnel_outbound: watch::Receiver<Option<mpsc::Sender<OutboundFrame>>>,
}
