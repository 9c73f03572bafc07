// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::key_issuer::KeyIssuer;
use crate::model::Permission;

use super::*;

fn layer(stt: ProviderConfig, tts: ProviderConfig) -> ProxyLayer {
    let issuer = Arc::new(KeyIssuer::new(Some("whisper".to_owned()), Some("elevenlabs".to_owned())));
    ProxyLayer::new(issuer, stt, tts, None)
}

#[tokio::test]
async fn transcribe_rejects_unknown_key() {
    let layer = layer(ProviderConfig::default(), ProviderConfig::default());
    let err = layer.transcribe("bogus", "ZGF0YQ==", None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthError);
}

#[tokio::test]
async fn transcribe_fails_when_provider_unconfigured() {
    let issuer = Arc::new(KeyIssuer::new(None, None));
    let key = issuer.issue("device-1", None, vec![Permission::Stt]).await;
    let layer = ProxyLayer::new(issuer, ProviderConfig::default(), ProviderConfig::default(), None);

    let err = layer.transcribe(&key.stt_key, "ZGF0YQ==", None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UpstreamError);
}

#[tokio::test]
async fn synthesize_direct_fails_when_provider_unconfigured() {
    let layer = layer(ProviderConfig::default(), ProviderConfig::default());
    let err = layer.synthesize_direct("hello", None, None, None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UpstreamError);
}

#[tokio::test]
async fn synthesize_rejects_key_without_tts_permission() {
    let issuer = Arc::new(KeyIssuer::new(None, None));
    let key = issuer.issue("device-1", None, vec![Permission::Stt]).await;
    let layer = ProxyLayer::new(issuer, ProviderConfig::default(), ProviderConfig::default(), None);

    let err = layer.synthesize(&key.tts_key, "hello", None, None, None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthError);
}
