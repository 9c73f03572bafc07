// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::state_store::StateStore;

use super::*;

async fn router() -> Arc<OutputRouter> {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::new(dir.path().join("tunnel.json"), dir.path().join("sessions.json")));
    std::mem::forget(dir);
    let registry = SessionRegistry::new(store, 4096);
    let (_tx, rx) = watch::channel(None);
    OutputRouter::new(registry, None, rx)
}

#[tokio::test]
async fn recording_dedup_emits_once_for_repeated_screen() {
    let router = router().await;
    let mut local = router.subscribe_local();
    router.reset_session("s1", "echo hello").await;

    for _ in 0..3 {
        router.route_screen_recorded("s1", 80, 24, b"hello").await;
    }

    let mut deltas = Vec::new();
    while let Ok(frame) = tokio::time::timeout(Duration::from_millis(50), local.recv()).await {
        if let OutboundFrame::RecordingOutput { delta, .. } = frame.unwrap() {
            deltas.push(delta);
        }
    }
    assert_eq!(deltas, vec!["hello".to_owned()]);
}

#[tokio::test]
async fn headless_chat_messages_and_completion_are_emitted() {
    let router = router().await;
    let mut local = router.subscribe_local();

    let assistant_line = br#"{"type":"assistant","message":{"content":[{"type":"text","text":"4"}]}}"#;
    router.route_headless("s1", assistant_line).await;
    let completion_line = br#"{"type":"result","subtype":"success"}"#;
    router.route_headless("s1", completion_line).await;

    let mut saw_chat = false;
    let mut saw_complete = false;
    while let Ok(frame) = tokio::time::timeout(Duration::from_millis(50), local.recv()).await {
        match frame.unwrap() {
            OutboundFrame::ChatMessage { .. } => saw_chat = true,
            OutboundFrame::RecordingOutput { is_complete, text, .. } => {
                saw_complete = is_complete;
                assert!(text.contains('4'));
            }
            _ => {}
        }
    }
    assert!(saw_chat);
    assert!(saw_complete);
}

#[tokio::test]
async fn tts_settings_are_stored_and_cleared_on_completion() {
    let router = router().await;
    router.set_tts_settings("s1", TtsSettings { enabled: true, speed: None, language: None }).await;
    assert!(router.tts_settings.lock().await.contains_key("s1"));

    router.route_headless("s1", br#"{"type":"result"}"#).await;
    assert!(!router.tts_settings.lock().await.contains_key("s1"));
}
