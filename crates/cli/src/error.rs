// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified error codes shared across the tunnel, local HTTP, and WebSocket
/// surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Missing/invalid laptop auth key, invalid registration key, expired
    /// ephemeral key.
    AuthError,
    /// Unknown session/device/workspace.
    NotFound,
    /// Bad terminal type, missing required field, malformed JSON.
    Validation,
    /// Outbound frame attempted while the tunnel socket is not open, and the
    /// 10s reconnect grace period has elapsed.
    TunnelDisconnected,
    /// STT/TTS/LLM provider failure.
    UpstreamError,
    /// Proxied request exceeded its deadline.
    Timeout,
    /// PTY spawn/wait failure.
    ProcessError,
    /// StateStore read failure; logged and rotated, not user-facing.
    CorruptedState,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthError => 401,
            Self::NotFound => 404,
            Self::Validation => 400,
            Self::TunnelDisconnected => 503,
            Self::UpstreamError => 502,
            Self::Timeout => 504,
            Self::ProcessError => 500,
            Self::CorruptedState => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthError => "AUTH_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::TunnelDisconnected => "TUNNEL_DISCONNECTED",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ProcessError => "PROCESS_ERROR",
            Self::CorruptedState => "CORRUPTED_STATE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`ErrorCode`] paired with a human-readable message, the unit carried
/// across every transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: ErrorCode,
    pub message: String,
    /// When set, overrides `code.http_status()` — used to surface an
    /// upstream provider's own status code verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_override: Option<u16>,
}

impl GatewayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), status_override: None }
    }

    /// Surface an upstream provider's own status code when one was
    /// observed, falling back to 502 for connection-level failures.
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self { code: ErrorCode::UpstreamError, message: message.into(), status_override: status }
    }

    pub fn http_status(&self) -> u16 {
        self.status_override.unwrap_or_else(|| self.code.http_status())
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
