// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! KeyIssuer: mints device-scoped ephemeral STT/TTS credentials. Guarded
//! by a single mutex; issuance is cheap and the sweep takes the same lock.

use std::collections::HashMap;
use std::time::Duration;

use rand::RngCore;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ErrorCode, GatewayError};
use crate::model::{epoch_secs, EphemeralKey, Permission};

/// How often the sweep drops expired keys.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default TTL granted when the caller doesn't specify one.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

pub struct KeyIssuer {
    keys: Mutex<HashMap<String, EphemeralKey>>,
    stt_provider: Option<String>,
    tts_provider: Option<String>,
}

impl KeyIssuer {
    pub fn new(stt_provider: Option<String>, tts_provider: Option<String>) -> Self {
        Self { keys: Mutex::new(HashMap::new()), stt_provider, tts_provider }
    }

    /// Mint (or overwrite) the key for `device_id`. Any prior key for the
    /// device is implicitly revoked.
    pub async fn issue(
        &self,
        device_id: &str,
        duration_seconds: Option<u64>,
        permissions: Vec<Permission>,
    ) -> EphemeralKey {
        let now = epoch_secs();
        let ttl = duration_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
        let key = EphemeralKey {
            device_id: device_id.to_owned(),
            stt_key: random_hex_key(),
            tts_key: random_hex_key(),
            stt_provider: self.stt_provider.clone(),
            tts_provider: self.tts_provider.clone(),
            permissions: permissions.into_iter().collect(),
            issued_at: now,
            expires_at: now + ttl,
            ref_count: 0,
        };
        info!(device_id, expires_at = key.expires_at, "issued ephemeral key");
        self.keys.lock().await.insert(device_id.to_owned(), key.clone());
        key
    }

    /// Extend the expiry of `device_id`'s key by the default TTL.
    pub async fn refresh(&self, device_id: &str) -> Result<EphemeralKey, GatewayError> {
        let mut keys = self.keys.lock().await;
        let key = keys.get_mut(device_id).ok_or_else(not_found)?;
        key.expires_at = epoch_secs() + DEFAULT_TTL_SECONDS;
        Ok(key.clone())
    }

    pub async fn revoke(&self, device_id: &str) {
        self.keys.lock().await.remove(device_id);
    }

    /// Verify a presented STT key, returning the owning device's
    /// permission set if it is live and unexpired.
    pub async fn verify_stt(&self, presented_key: &str) -> Result<String, GatewayError> {
        self.verify(presented_key, Permission::Stt, |k| &k.stt_key).await
    }

    pub async fn verify_tts(&self, presented_key: &str) -> Result<String, GatewayError> {
        self.verify(presented_key, Permission::Tts, |k| &k.tts_key).await
    }

    async fn verify(
        &self,
        presented_key: &str,
        required: Permission,
        field: impl Fn(&EphemeralKey) -> &String,
    ) -> Result<String, GatewayError> {
        let mut keys = self.keys.lock().await;
        let now = epoch_secs();
        for key in keys.values_mut() {
            if field(key) == presented_key {
                if key.expires_at <= now {
                    return Err(auth_error());
                }
                if !key.permissions.contains(&required) {
                    return Err(auth_error());
                }
                key.ref_count += 1;
                return Ok(key.device_id.clone());
            }
        }
        Err(auth_error())
    }

    /// Run until `shutdown` is cancelled, dropping expired keys every
    /// [`SWEEP_INTERVAL`].
    pub async fn run_sweep(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
                _ = shutdown.cancelled() => return,
            }
            let now = epoch_secs();
            let mut keys = self.keys.lock().await;
            let before = keys.len();
            keys.retain(|_, key| key.expires_at > now);
            let dropped = before - keys.len();
            if dropped > 0 {
                debug!(dropped, "swept expired ephemeral keys");
            }
        }
    }
}

fn random_hex_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn not_found() -> GatewayError {
    GatewayError::new(ErrorCode::NotFound, "no ephemeral key for device".to_owned())
}

fn auth_error() -> GatewayError {
    GatewayError::new(ErrorCode::AuthError, "ephemeral key invalid, expired, or lacks permission".to_owned())
}

#[cfg(test)]
#[path = "key_issuer_tests.rs"]
mod tests;
