// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ProxyLayer: verifies ephemeral keys and forwards STT/TTS requests to
//! upstream providers. Also exposes a direct (unkeyed) synthesis path used
//! internally by OutputRouter for server-initiated TTS on completion.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::error::{ErrorCode, GatewayError};
use crate::key_issuer::KeyIssuer;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

pub struct ProxyLayer {
    key_issuer: Arc<KeyIssuer>,
    http: reqwest::Client,
    stt: ProviderConfig,
    tts: ProviderConfig,
    default_voice: Option<String>,
}

impl ProxyLayer {
    pub fn new(key_issuer: Arc<KeyIssuer>, stt: ProviderConfig, tts: ProviderConfig, default_voice: Option<String>) -> Self {
        Self {
            key_issuer,
            http: reqwest::Client::builder().timeout(UPSTREAM_TIMEOUT).build().unwrap_or_default(),
            stt,
            tts,
            default_voice,
        }
    }

    /// `POST /proxy/stt/transcribe`. `bearer` is the presented STT key.
    pub async fn transcribe(&self, bearer: &str, audio_b64: &str, language: Option<&str>) -> Result<String, GatewayError> {
        self.key_issuer.verify_stt(bearer).await?;
        self.transcribe_direct(audio_b64, language).await
    }

    /// Transcribe without a device key — used by AgentOrchestrator's
    /// Supervisor-mode audio input, which never sees an ephemeral key.
    pub async fn transcribe_direct(&self, audio_b64: &str, language: Option<&str>) -> Result<String, GatewayError> {
        let base = self
            .stt
            .base_url
            .as_deref()
            .ok_or_else(|| GatewayError::new(ErrorCode::UpstreamError, "stt provider not configured"))?;

        let mut req = self.http.post(format!("{base}/transcribe")).json(&json!({
            "audio": audio_b64,
            "language": language,
        }));
        if let Some(key) = &self.stt.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| GatewayError::upstream(None, e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::upstream(Some(status.as_u16()), "stt upstream request failed"));
        }
        let body: serde_json::Value =
            resp.json().await.map_err(|e| GatewayError::upstream(None, e.to_string()))?;
        Ok(body.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_owned())
    }

    /// `POST /proxy/tts/synthesize`. `bearer` is the presented TTS key.
    pub async fn synthesize(
        &self,
        bearer: &str,
        text: &str,
        voice: Option<&str>,
        speed: Option<f32>,
        language: Option<&str>,
    ) -> Result<(String, String), GatewayError> {
        self.key_issuer.verify_tts(bearer).await?;
        self.synthesize_direct(text, voice, speed, language).await
    }

    /// Synthesize without a device key — used by OutputRouter when
    /// server-side TTS is enabled for a session.
    pub async fn synthesize_direct(
        &self,
        text: &str,
        voice: Option<&str>,
        speed: Option<f32>,
        language: Option<&str>,
    ) -> Result<(String, String), GatewayError> {
        let base = self
            .tts
            .base_url
            .as_deref()
            .ok_or_else(|| GatewayError::new(ErrorCode::UpstreamError, "tts provider not configured"))?;
        let voice = voice.or(self.default_voice.as_deref());

        let mut req = self.http.post(format!("{base}/synthesize")).json(&json!({
            "text": text,
            "voice": voice,
            "speed": speed,
            "language": language,
        }));
        if let Some(key) = &self.tts.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| GatewayError::upstream(None, e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::upstream(Some(status.as_u16()), "tts upstream request failed"));
        }
        let body: serde_json::Value =
            resp.json().await.map_err(|e| GatewayError::upstream(None, e.to_string()))?;
        let audio = body.get("audio").and_then(|v| v.as_str()).unwrap_or_default().to_owned();
        let format = body.get("format").and_then(|v| v.as_str()).unwrap_or("mp3").to_owned();
        Ok((audio, format))
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
