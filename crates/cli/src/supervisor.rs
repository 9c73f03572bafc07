// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifetime. Loads or mints the persisted [`TunnelIdentity`], wires
//! every component (SessionRegistry, KeyIssuer, ProxyLayer,
//! AgentOrchestrator, WorkspaceManager, TunnelClient, OutputRouter, the
//! local REST+WS listener), prints the enrollment payload, then runs until
//! a signal arrives and drives the shutdown sequence: stop accepting new
//! connections, cancel the tunnel reader, drain the outbound queue (≤ 5s),
//! destroy sessions in parallel (each bounded by 5s), flush StateStore,
//! exit. A second signal forces an immediate exit.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::agent_orchestrator::{AgentOrchestrator, LlmConfig};
use crate::config::Config;
use crate::enrollment::EnrollmentPayload;
use crate::key_issuer::KeyIssuer;
use crate::model::{epoch_secs, TunnelIdentity};
use crate::output_router::OutputRouter;
use crate::proxy::{ProviderConfig, ProxyLayer};
use crate::session_registry::SessionRegistry;
use crate::state_store::StateStore;
use crate::transport::{self, AppState};
use crate::tunnel_client::TunnelClient;
use crate::workspace::WorkspaceManager;

/// Upper bound on each session's PTY teardown during shutdown.
const SESSION_DESTROY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    // Priority: --log-level / WIREPORT_LOG_LEVEL > RUST_LOG > default ("info").
    let filter = if std::env::var("RUST_LOG").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => tracing_subscriber::fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the gateway to completion: startup orchestration, serve, shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);
    let shutdown = CancellationToken::new();

    tokio::fs::create_dir_all(&config.state_dir).await?;
    let state_store = Arc::new(StateStore::new(config.tunnel_json_path(), config.sessions_json_path()));

    let identity = load_or_create_identity(&config, &state_store).await?;
    info!(tunnel_id = %identity.tunnel_id, display_name = %config.display_name, "tunnel identity ready");
    print_enrollment_payload(&identity);

    let registry = SessionRegistry::new(state_store.clone(), config.ring_size);
    registry.restore_sessions().await;

    let key_issuer = Arc::new(KeyIssuer::new(config.stt_provider.clone(), config.tts_provider.clone()));
    {
        let key_issuer = key_issuer.clone();
        let sd = shutdown.clone();
        tokio::spawn(async move { key_issuer.run_sweep(sd).await });
    }

    let proxy = Arc::new(ProxyLayer::new(
        key_issuer.clone(),
        ProviderConfig { base_url: config.stt_base_url.clone(), api_key: config.stt_api_key.clone() },
        ProviderConfig { base_url: config.tts_base_url.clone(), api_key: config.tts_api_key.clone() },
        config.tts_voice.clone(),
    ));

    let workspace = Arc::new(WorkspaceManager::new(config.state_dir.join("workspaces")));

    let llm = LlmConfig {
        base_url: config.llm_base_url.clone(),
        api_key: config.llm_api_key.clone(),
        model: config.llm_model.clone(),
    };
    let orchestrator =
        Arc::new(AgentOrchestrator::new(llm, Some(proxy.clone()), registry.clone(), workspace.clone()));

    // `outbound_watch_tx` is created here, ahead of TunnelClient, so its
    // receiver can be cloned into both AppState and OutputRouter before the
    // tunnel-facing router — which needs AppState — is built.
    let (outbound_watch_tx, outbound_watch_rx) = watch::channel(None);

    let output_router = OutputRouter::new(registry.clone(), Some(proxy.clone()), outbound_watch_rx.clone());
    output_router.clone().spawn();

    let state = Arc::new(AppState {
        registry: registry.clone(),
        key_issuer,
        proxy: Some(proxy),
        orchestrator,
        workspace,
        output_router,
        laptop_auth_key: identity.laptop_auth_key.clone(),
        tunnel_outbound: outbound_watch_rx,
    });

    let tunnel_router = transport::build_tunnel_router(state.clone());
    let local_router = transport::build_local_router(state.clone());

    let tunnel_client = TunnelClient::new(
        identity.ws_url.clone(),
        identity.tunnel_id.clone(),
        identity.registration_key.clone(),
        registry.clone(),
        tunnel_router,
        outbound_watch_tx,
        shutdown.clone(),
    );
    let tunnel_task = tunnel_client.spawn();

    let addr = SocketAddr::from(([127, 0, 0, 1], config.web_port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "local server listening");
    let local_server = {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, local_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(sd.cancelled_owned())
                .await;
            if let Err(e) = result {
                error!(err = %e, "local server error");
            }
        })
    };

    wait_for_shutdown_signal(shutdown.clone());
    shutdown.cancelled().await;
    info!("shutdown initiated: no longer accepting new connections");

    // Stop accepting new local connections first, then let TunnelClient's
    // writer task drain whatever it already had queued (bounded internally
    // by its own drain timeout) before tearing down sessions.
    let _ = local_server.await;
    let _ = tunnel_task.await;
    destroy_sessions(&registry).await;

    if let Err(e) = state_store.save_sessions(&registry.list().await).await {
        warn!(err = %e, "failed to flush sessions on shutdown");
    }

    info!("shutdown complete");
    Ok(())
}

/// Destroy every live session in parallel, each bounded by
/// [`SESSION_DESTROY_TIMEOUT`] so one stuck PTY can't stall the others.
async fn destroy_sessions(registry: &Arc<SessionRegistry>) {
    let descriptors = registry.list().await;
    let mut tasks = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let session_id = descriptor.session_id.clone();
            match tokio::time::timeout(SESSION_DESTROY_TIMEOUT, registry.destroy(&session_id)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(session_id, err = %e, "session destroy failed during shutdown"),
                Err(_) => warn!(session_id, "session destroy timed out during shutdown"),
            }
        }));
    }
    for task in tasks {
        let _ = task.await;
    }
}

/// Races SIGTERM/SIGINT; the first signal cancels `shutdown`, a second
/// forces an immediate process exit regardless of how far shutdown has
/// progressed.
fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM again, forcing exit");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT again, forcing exit");
            }
        }
        std::process::exit(130);
    });
}

/// Load a persisted [`TunnelIdentity`] or mint one from `config`, persisting
/// the freshly-minted identity before returning it.
async fn load_or_create_identity(config: &Config, state_store: &StateStore) -> anyhow::Result<TunnelIdentity> {
    if let Some(identity) = state_store.load_tunnel_identity().await {
        return Ok(identity);
    }

    let rendezvous_url = config.rendezvous_url.trim_end_matches('/').to_owned();
    let ws_url = rendezvous_url.replacen("https://", "wss://", 1).replacen("http://", "ws://", 1);
    let identity = TunnelIdentity {
        tunnel_id: uuid::Uuid::new_v4().to_string(),
        registration_key: config.registration_key.clone(),
        public_url: rendezvous_url,
        ws_url,
        laptop_auth_key: config.laptop_auth_key.clone().unwrap_or_else(random_laptop_auth_key),
        created_at: epoch_secs(),
    };
    state_store.save_tunnel_identity(&identity).await?;
    Ok(identity)
}

fn random_laptop_auth_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Print the QR enrollment payload to stdout. Actual QR rendering happens
/// on the mobile/browser side; this process only needs to surface the JSON
/// a client scans or pastes in.
fn print_enrollment_payload(identity: &TunnelIdentity) {
    let payload = EnrollmentPayload::from_identity(identity);
    println!("{}", payload.to_json());
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
