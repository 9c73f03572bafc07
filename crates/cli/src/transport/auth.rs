// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authority boundary for the tunnel-facing surface: every proxied request
//! must carry `X-Laptop-Auth-Key` matching the persisted laptop secret.
//! Anything past this layer is trusted as originating from an enrolled
//! device — the local loopback surface uses a different gate
//! ([`crate::transport::local_ws`]) since it never proxies through the
//! rendezvous relay.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorCode;
use crate::transport::state::AppState;
use crate::transport::ErrorResponse;

/// Constant-time string comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

pub async fn auth_layer(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let presented = req.headers().get("x-laptop-auth-key").and_then(|v| v.to_str().ok());

    let ok = match presented {
        Some(key) => constant_time_eq(key, &state.laptop_auth_key),
        None => false,
    };

    if !ok {
        let body = ErrorResponse { error: ErrorCode::AuthError.to_error_body("missing or invalid X-Laptop-Auth-Key") };
        return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
