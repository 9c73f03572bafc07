// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn issuer() -> KeyIssuer {
    KeyIssuer::new(Some("whisper".to_owned()), Some("elevenlabs".to_owned()))
}

#[tokio::test]
async fn issue_then_verify_succeeds() {
    let issuer = issuer();
    let key = issuer.issue("device-1", None, vec![Permission::Stt, Permission::Tts]).await;

    let device_id = issuer.verify_stt(&key.stt_key).await.unwrap();
    assert_eq!(device_id, "device-1");
}

#[tokio::test]
async fn verify_rejects_unknown_key() {
    let issuer = issuer();
    let err = issuer.verify_stt("not-a-real-key").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthError);
}

#[tokio::test]
async fn verify_rejects_key_missing_permission() {
    let issuer = issuer();
    let key = issuer.issue("device-1", None, vec![Permission::Tts]).await;
    let err = issuer.verify_stt(&key.stt_key).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthError);
}

#[tokio::test]
async fn reissue_revokes_prior_key() {
    let issuer = issuer();
    let first = issuer.issue("device-1", None, vec![Permission::Stt]).await;
    let second = issuer.issue("device-1", None, vec![Permission::Stt]).await;

    assert!(issuer.verify_stt(&first.stt_key).await.is_err());
    assert!(issuer.verify_stt(&second.stt_key).await.is_ok());
}

#[tokio::test]
async fn revoke_removes_key() {
    let issuer = issuer();
    let key = issuer.issue("device-1", None, vec![Permission::Stt]).await;
    issuer.revoke("device-1").await;
    assert!(issuer.verify_stt(&key.stt_key).await.is_err());
}

#[tokio::test]
async fn expired_key_fails_verification() {
    let issuer = issuer();
    let key = issuer.issue("device-1", Some(0), vec![Permission::Stt]).await;
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let _ = key;
    // duration_seconds=0 means expires_at == issued_at, already in the past
    // relative to any subsequent `epoch_secs()` call a second later.
    let key_again = issuer.issue("device-2", Some(0), vec![Permission::Stt]).await;
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    assert!(issuer.verify_stt(&key_again.stt_key).await.is_err());
}

#[tokio::test]
async fn refresh_extends_expiry() {
    let issuer = issuer();
    let key = issuer.issue("device-1", Some(5), vec![Permission::Stt]).await;
    let refreshed = issuer.refresh("device-1").await.unwrap();
    assert!(refreshed.expires_at >= key.expires_at);
}

#[tokio::test]
async fn refresh_unknown_device_is_not_found() {
    let issuer = issuer();
    let err = issuer.refresh("nope").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}
