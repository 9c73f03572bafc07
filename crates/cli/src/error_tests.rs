// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    auth_error = { ErrorCode::AuthError, 401 },
    not_found = { ErrorCode::NotFound, 404 },
    validation = { ErrorCode::Validation, 400 },
    tunnel_disconnected = { ErrorCode::TunnelDisconnected, 503 },
    upstream_error = { ErrorCode::UpstreamError, 502 },
    timeout = { ErrorCode::Timeout, 504 },
    process_error = { ErrorCode::ProcessError, 500 },
    corrupted_state = { ErrorCode::CorruptedState, 500 },
)]
fn http_status(code: ErrorCode, expected: u16) {
    assert_eq!(code.http_status(), expected);
}

#[test]
fn gateway_error_defaults_to_code_status() {
    let err = GatewayError::new(ErrorCode::NotFound, "no such session");
    assert_eq!(err.http_status(), 404);
}

#[test]
fn upstream_error_surfaces_provider_status() {
    let err = GatewayError::upstream(Some(429), "rate limited");
    assert_eq!(err.http_status(), 429);
    assert_eq!(err.code, ErrorCode::UpstreamError);
}

#[test]
fn upstream_error_falls_back_to_502_without_status() {
    let err = GatewayError::upstream(None, "connection refused");
    assert_eq!(err.http_status(), 502);
}
