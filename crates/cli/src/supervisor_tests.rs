// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use super::*;
use crate::config::Config;

fn base_config(state_dir: PathBuf) -> Config {
    Config {
        rendezvous_url: "https://relay.example.com".to_owned(),
        registration_key: "reg-key".to_owned(),
        laptop_auth_key: None,
        display_name: "laptop".to_owned(),
        state_dir,
        web_port: 4732,
        stt_provider: None,
        stt_base_url: None,
        stt_api_key: None,
        tts_provider: None,
        tts_base_url: None,
        tts_api_key: None,
        tts_voice: None,
        llm_provider: None,
        llm_base_url: None,
        llm_api_key: None,
        llm_model: None,
        cols: 80,
        rows: 24,
        ring_size: 262_144,
        log_format: "json".to_owned(),
        log_level: "info".to_owned(),
    }
}

#[tokio::test]
async fn load_or_create_identity_mints_and_persists_on_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path().to_path_buf());
    let store = StateStore::new(config.tunnel_json_path(), config.sessions_json_path());

    let identity = load_or_create_identity(&config, &store).await.unwrap();
    assert_eq!(identity.registration_key, "reg-key");
    assert_eq!(identity.ws_url, "wss://relay.example.com");
    assert_eq!(identity.laptop_auth_key.len(), 64);

    let reloaded = store.load_tunnel_identity().await.unwrap();
    assert_eq!(reloaded.tunnel_id, identity.tunnel_id);
}

#[tokio::test]
async fn load_or_create_identity_reuses_persisted_identity() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path().to_path_buf());
    let store = StateStore::new(config.tunnel_json_path(), config.sessions_json_path());

    let first = load_or_create_identity(&config, &store).await.unwrap();
    let second = load_or_create_identity(&config, &store).await.unwrap();
    assert_eq!(first.tunnel_id, second.tunnel_id);
    assert_eq!(first.laptop_auth_key, second.laptop_auth_key);
}

#[tokio::test]
async fn load_or_create_identity_honors_configured_auth_key() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path().to_path_buf());
    config.laptop_auth_key = Some("fixed-secret".to_owned());
    let store = StateStore::new(config.tunnel_json_path(), config.sessions_json_path());

    let identity = load_or_create_identity(&config, &store).await.unwrap();
    assert_eq!(identity.laptop_auth_key, "fixed-secret");
}

#[test]
fn random_laptop_auth_key_is_64_hex_chars() {
    let key = random_laptop_auth_key();
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn destroy_sessions_clears_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::new(dir.path().join("tunnel.json"), dir.path().join("sessions.json")));
    let registry = SessionRegistry::new(store, 4096);
    registry
        .create(crate::model::TerminalType::Regular, None, None)
        .await
        .expect("create session");
    assert_eq!(registry.list().await.len(), 1);

    destroy_sessions(&registry).await;
    assert!(registry.list().await.is_empty());
}
