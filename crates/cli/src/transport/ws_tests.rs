// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn text_frame_parses() {
    let inbound: AgentWsInbound = serde_json::from_str(r#"{"type":"text","text":"hello"}"#).unwrap();
    match inbound {
        AgentWsInbound::Text { text } => assert_eq!(text, "hello"),
        other => panic!("expected Text, got {other:?}"),
    }
}

#[test]
fn audio_frame_parses_with_optional_language() {
    let inbound: AgentWsInbound =
        serde_json::from_str(r#"{"type":"audio","audio":"base64data","language":"en"}"#).unwrap();
    match inbound {
        AgentWsInbound::Audio { audio, language } => {
            assert_eq!(audio, "base64data");
            assert_eq!(language.as_deref(), Some("en"));
        }
        other => panic!("expected Audio, got {other:?}"),
    }
}

#[test]
fn audio_frame_language_defaults_to_none() {
    let inbound: AgentWsInbound = serde_json::from_str(r#"{"type":"audio","audio":"base64data"}"#).unwrap();
    match inbound {
        AgentWsInbound::Audio { language, .. } => assert!(language.is_none()),
        other => panic!("expected Audio, got {other:?}"),
    }
}

#[test]
fn reset_context_frame_parses() {
    let inbound: AgentWsInbound = serde_json::from_str(r#"{"type":"reset_context"}"#).unwrap();
    assert!(matches!(inbound, AgentWsInbound::ResetContext));
}

#[test]
fn malformed_frame_fails_to_parse() {
    let result = serde_json::from_str::<AgentWsInbound>(r#"{"type":"not_a_real_type"}"#);
    assert!(result.is_err());
}
