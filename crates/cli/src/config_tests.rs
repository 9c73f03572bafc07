// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use super::Config;

fn base() -> Config {
    Config {
        rendezvous_url: "https://relay.example.com".to_owned(),
        registration_key: "reg-key".to_owned(),
        laptop_auth_key: None,
        display_name: "laptop".to_owned(),
        state_dir: PathBuf::from("/tmp/wireport-test"),
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

#[test]
fn rejects_empty_rendezvous_url() {
    let mut cfg = base();
    cfg.rendezvous_url = "  ".to_owned();
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_empty_registration_key() {
    let mut cfg = base();
    cfg.registration_key = String::new();
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_zero_dimensions() {
    let mut cfg = base();
    cfg.cols = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unknown_log_format() {
    let mut cfg = base();
    cfg.log_format = "xml".to_owned();
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_valid_config() {
    assert!(base().validate().is_ok());
}

#[test]
fn state_paths_join_state_dir() {
    let cfg = base();
    assert_eq!(cfg.tunnel_json_path(), PathBuf::from("/tmp/wireport-test/tunnel.json"));
    assert_eq!(cfg.sessions_json_path(), PathBuf::from("/tmp/wireport-test/sessions.json"));
}
