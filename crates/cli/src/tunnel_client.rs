// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TunnelClient: the sole owner of the outbound websocket to the
//! rendezvous server. Dispatches inbound `http_request` frames through
//! the shared REST router (the same one LocalHTTPServer mounts) and
//! `terminal_input` frames into SessionRegistry, and publishes its
//! current outbound sender through a watch channel so OutputRouter can
//! reach it without TunnelClient ever holding a reference back.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{info, warn};

use crate::model::{InboundFrame, OutboundFrame};
use crate::session_registry::SessionRegistry;
use std::sync::Arc;

/// Bounded outbound queue; producers (route dispatch, OutputRouter) block
/// on full rather than drop frames.
const OUTBOUND_QUEUE_DEPTH: usize = 256;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
/// On shutdown, how long the writer task keeps flushing already-queued
/// outbound frames before giving up on the connection.
const OUTBOUND_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TunnelClient {
    ws_url: String,
    tunnel_id: String,
    registration_key: String,
    registry: Arc<SessionRegistry>,
    router: axum::Router,
    outbound_watch_tx: watch::Sender<Option<mpsc::Sender<OutboundFrame>>>,
    shutdown: CancellationToken,
}

impl TunnelClient {
    /// `outbound_watch_tx` is created by the caller (Supervisor) so the
    /// matching receiver can be handed to both AppState (`/tunnel-status`)
    /// and OutputRouter before the tunnel-facing router — which itself
    /// needs AppState — exists. TunnelClient is the sole writer.
    pub fn new(
        ws_url: String,
        tunnel_id: String,
        registration_key: String,
        registry: Arc<SessionRegistry>,
        router: axum::Router,
        outbound_watch_tx: watch::Sender<Option<mpsc::Sender<OutboundFrame>>>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self { ws_url, tunnel_id, registration_key, registry, router, outbound_watch_tx, shutdown })
    }

    /// Drive the connect/serve/reconnect loop until cancelled or retries
    /// are exhausted. Spawned once at startup; the returned handle lets
    /// Supervisor bound how long it waits for the outbound drain on
    /// shutdown.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self: Arc<Self>) {
        let mut attempt = 0u32;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            match self.connect_and_serve().await {
                Ok(()) => {
                    attempt = 0;
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => {
                    warn!(err = %e, attempt, "tunnel connection failed");
                    attempt += 1;
                    if attempt > MAX_RETRIES {
                        warn!("tunnel reconnect retries exhausted, giving up");
                        return;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = self.shutdown.cancelled() => return,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }

            let _ = self.outbound_watch_tx.send(None);
        }
    }

    async fn connect_and_serve(&self) -> anyhow::Result<()> {
        let url = format!("{}/tunnel/{}", self.ws_url, self.tunnel_id);
        let mut request = url.into_client_request()?;
        request.headers_mut().insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {}", self.registration_key))?,
        );

        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        info!(tunnel_id = %self.tunnel_id, "tunnel connected");
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_QUEUE_DEPTH);
        let _ = self.outbound_watch_tx.send(Some(outbound_tx.clone()));

        // Reconnect always re-materializes local state on the remote side.
        self.registry.restore_sessions().await;

        let shutdown = self.shutdown.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else { break };
                        let Ok(text) = serde_json::to_string(&frame) else { continue };
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    _ = shutdown.cancelled() => {
                        // Keep flushing whatever is already queued instead of
                        // dropping it, bounded so a stalled socket can't hang
                        // shutdown indefinitely.
                        let deadline = tokio::time::Instant::now() + OUTBOUND_DRAIN_TIMEOUT;
                        while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, outbound_rx.recv()).await {
                            let Ok(text) = serde_json::to_string(&frame) else { continue };
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        break;
                    }
                }
            }
            let _ = ws_tx.close().await;
        });

        let result = loop {
            let msg = tokio::select! {
                msg = tokio::time::timeout(IDLE_TIMEOUT, ws_rx.next()) => msg,
                _ = self.shutdown.cancelled() => break Ok(()),
            };

            let msg = match msg {
                Ok(Some(Ok(m))) => m,
                Ok(Some(Err(e))) => break Err(e.into()),
                Ok(None) => break Err(anyhow::anyhow!("tunnel stream closed")),
                Err(_) => break Err(anyhow::anyhow!("no data for {IDLE_TIMEOUT:?}, declaring dead")),
            };

            match msg {
                Message::Text(text) => self.handle_frame(text.as_str(), &outbound_tx).await,
                Message::Close(_) => break Err(anyhow::anyhow!("tunnel closed by peer")),
                _ => {}
            }
        };

        // On a clean shutdown give the writer its drain window instead of
        // cutting it off; any other exit path (error, peer close) aborts it
        // immediately since there's nothing left worth flushing.
        if result.is_ok() {
            let _ = tokio::time::timeout(OUTBOUND_DRAIN_TIMEOUT + Duration::from_secs(1), writer).await;
        } else {
            writer.abort();
        }
        result
    }

    async fn handle_frame(&self, text: &str, outbound_tx: &mpsc::Sender<OutboundFrame>) {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                warn!(err = %e, "failed to parse inbound tunnel frame");
                return;
            }
        };

        match frame {
            InboundFrame::HttpRequest { request_id, method, path, headers, body, query } => {
                let router = self.router.clone();
                let outbound_tx = outbound_tx.clone();
                tokio::spawn(async move {
                    let response =
                        dispatch_http_request(router, &request_id, &method, &path, headers, body, query).await;
                    let _ = outbound_tx.send(response).await;
                });
            }
            InboundFrame::TerminalInput { session_id, data } => {
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    if let Err(e) = registry.write_input(&session_id, bytes::Bytes::from(data.into_bytes())).await {
                        warn!(session_id, err = %e, "failed to deliver terminal input from tunnel");
                    }
                });
            }
        }
    }
}

/// Build an axum request from a proxied `http_request` frame, dispatch it
/// through the shared router, and fold the response back into an
/// `http_response` frame. Bounded by `REQUEST_TIMEOUT`; a slow or hung
/// handler surfaces as a 504.
async fn dispatch_http_request(
    router: axum::Router,
    request_id: &str,
    method: &str,
    path: &str,
    headers: std::collections::HashMap<String, String>,
    body: Option<String>,
    query: std::collections::HashMap<String, String>,
) -> OutboundFrame {
    let uri = if query.is_empty() {
        path.to_owned()
    } else {
        let qs = query.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
        format!("{path}?{qs}")
    };

    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in &headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(k.as_str()), HeaderValue::try_from(v.as_str())) {
            builder = builder.header(name, value);
        }
    }

    let body = Body::from(body.unwrap_or_default());
    let request = match builder.body(body) {
        Ok(r) => r,
        Err(e) => {
            return OutboundFrame::HttpResponse {
                request_id: request_id.to_owned(),
                status_code: 400,
                body: format!("{{\"error\":\"malformed proxied request: {e}\"}}"),
            }
        }
    };

    let outcome = tokio::time::timeout(REQUEST_TIMEOUT, router.oneshot(request)).await;
    match outcome {
        Ok(Ok(response)) => {
            let status = response.status().as_u16();
            let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap_or_default();
            OutboundFrame::HttpResponse {
                request_id: request_id.to_owned(),
                status_code: status,
                body: String::from_utf8_lossy(&body_bytes).into_owned(),
            }
        }
        Ok(Err(infallible)) => match infallible {},
        Err(_) => OutboundFrame::HttpResponse {
            request_id: request_id.to_owned(),
            status_code: 504,
            body: "{\"error\":\"proxied request timed out\"}".to_owned(),
        },
    }
}

#[cfg(test)]
#[path = "tunnel_client_tests.rs"]
mod tests;
