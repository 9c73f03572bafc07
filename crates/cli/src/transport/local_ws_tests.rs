// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn stream_inbound_input_parses() {
    let inbound: StreamInbound = serde_json::from_str(r#"{"type":"input","data":"aGVsbG8="}"#).unwrap();
    let StreamInbound::Input { data } = inbound;
    assert_eq!(data, "aGVsbG8=");
}

#[test]
fn stream_outbound_output_serializes() {
    let outbound = StreamOutbound::Output { session_id: "sess-1".to_owned(), data: "aGVsbG8=".to_owned(), timestamp: 42 };
    let json = serde_json::to_string(&outbound).unwrap();
    assert!(json.contains("\"type\":\"output\""));
    assert!(json.contains("\"session_id\":\"sess-1\""));
    assert!(json.contains("\"timestamp\":42"));
}

#[test]
fn malformed_stream_inbound_fails_to_parse() {
    let result = serde_json::from_str::<StreamInbound>(r#"{"type":"not_a_real_type"}"#);
    assert!(result.is_err());
}
