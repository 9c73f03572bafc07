// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! QR enrollment payload: what a mobile client scans to learn how to
//! reach this laptop through the tunnel.

use serde::Serialize;

use crate::model::TunnelIdentity;

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentPayload {
    #[serde(rename = "tunnelId")]
    pub tunnel_id: String,
    #[serde(rename = "tunnelUrl")]
    pub tunnel_url: String,
    #[serde(rename = "wsUrl")]
    pub ws_url: String,
    #[serde(rename = "keyEndpoint")]
    pub key_endpoint: String,
    #[serde(rename = "authKey")]
    pub auth_key: String,
}

impl EnrollmentPayload {
    pub fn from_identity(identity: &TunnelIdentity) -> Self {
        Self {
            tunnel_id: identity.tunnel_id.clone(),
            tunnel_url: identity.public_url.clone(),
            ws_url: identity.ws_url.clone(),
            key_endpoint: format!("{}/keys/request", identity.public_url),
            auth_key: identity.laptop_auth_key.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "enrollment_tests.rs"]
mod tests;
