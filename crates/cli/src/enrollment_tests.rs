// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn identity() -> TunnelIdentity {
    TunnelIdentity {
        tunnel_id: "t1".to_owned(),
        registration_key: "reg".to_owned(),
        public_url: "https://example.test".to_owned(),
        ws_url: "wss://example.test".to_owned(),
        laptop_auth_key: "secret".to_owned(),
        created_at: 0,
    }
}

#[test]
fn payload_derives_key_endpoint_from_public_url() {
    let payload = EnrollmentPayload::from_identity(&identity());
    assert_eq!(payload.key_endpoint, "https://example.test/keys/request");
    assert_eq!(payload.auth_key, "secret");
}

#[test]
fn payload_serializes_with_camel_case_field_names() {
    let json = EnrollmentPayload::from_identity(&identity()).to_json();
    assert!(json.contains("\"tunnelId\""));
    assert!(json.contains("\"wsUrl\""));
}
