// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::model::TerminalType;

use super::*;

fn identity() -> TunnelIdentity {
    TunnelIdentity {
        tunnel_id: "t1".to_owned(),
        registration_key: "rk".to_owned(),
        public_url: "https://example.test/t1".to_owned(),
        ws_url: "wss://example.test/t1".to_owned(),
        laptop_auth_key: "secret".to_owned(),
        created_at: 1_700_000_000,
    }
}

fn descriptor(id: &str) -> SessionDescriptor {
    SessionDescriptor {
        session_id: id.to_owned(),
        terminal_type: TerminalType::Regular,
        working_dir: None,
        name: None,
        cols: 80,
        rows: 24,
        created_at: 0,
    }
}

#[tokio::test]
async fn missing_files_load_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("tunnel.json"), dir.path().join("sessions.json"));

    assert!(store.load_tunnel_identity().await.is_none());
    assert!(store.load_sessions().await.is_empty());
}

#[tokio::test]
async fn round_trips_tunnel_identity() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("tunnel.json"), dir.path().join("sessions.json"));

    store.save_tunnel_identity(&identity()).await.unwrap();
    let loaded = store.load_tunnel_identity().await.expect("loaded");
    assert_eq!(loaded.tunnel_id, "t1");
}

#[tokio::test]
async fn round_trips_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("tunnel.json"), dir.path().join("sessions.json"));

    let descriptors = vec![descriptor("s1"), descriptor("s2")];
    store.save_sessions(&descriptors).await.unwrap();
    let loaded = store.load_sessions().await;
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].session_id, "s1");
}

#[tokio::test]
async fn corrupt_file_is_rotated_aside_and_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let tunnel_path = dir.path().join("tunnel.json");
    tokio::fs::write(&tunnel_path, b"{not valid json").await.unwrap();
    let store = StateStore::new(tunnel_path.clone(), dir.path().join("sessions.json"));

    assert!(store.load_tunnel_identity().await.is_none());
    assert!(!tunnel_path.exists());

    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    let mut saw_rotated = false;
    while let Some(entry) = entries.next_entry().await.unwrap() {
        if entry.file_name().to_string_lossy().contains("corrupt-") {
            saw_rotated = true;
        }
    }
    assert!(saw_rotated);
}
