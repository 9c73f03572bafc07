// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Laptop-side remote-control gateway.
#[derive(Debug, Clone, Parser)]
#[command(name = "wireport", version, about)]
pub struct Config {
    /// Base URL of the rendezvous server, used only to bootstrap a tunnel
    /// identity when none is persisted yet (e.g. `https://relay.example.com`).
    #[arg(long, env = "WIREPORT_RENDEZVOUS_URL")]
    pub rendezvous_url: String,

    /// Registration key handed to the rendezvous server when claiming or
    /// reclaiming a tunnel identity.
    #[arg(long, env = "WIREPORT_REGISTRATION_KEY")]
    pub registration_key: String,

    /// Locally generated secret required on every inbound proxied request
    /// (`X-Laptop-Auth-Key`). Generated and persisted on first run if unset.
    #[arg(long, env = "WIREPORT_LAPTOP_AUTH_KEY")]
    pub laptop_auth_key: Option<String>,

    /// Human-readable name shown to mobile clients during enrollment.
    #[arg(long, env = "WIREPORT_DISPLAY_NAME", default_value = "laptop")]
    pub display_name: String,

    /// Directory for persisted state (`tunnel.json`, `sessions.json`).
    #[arg(long, env = "WIREPORT_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Loopback port for the local browser UI (REST + WS).
    #[arg(long, env = "WIREPORT_WEB_PORT", default_value = "4732")]
    pub web_port: u16,

    /// Speech-to-text provider name (e.g. "whisper").
    #[arg(long, env = "WIREPORT_STT_PROVIDER")]
    pub stt_provider: Option<String>,
    /// Upstream STT API base URL.
    #[arg(long, env = "WIREPORT_STT_BASE_URL")]
    pub stt_base_url: Option<String>,
    /// Upstream STT API key.
    #[arg(long, env = "WIREPORT_STT_API_KEY")]
    pub stt_api_key: Option<String>,

    /// Text-to-speech provider name (e.g. "elevenlabs").
    #[arg(long, env = "WIREPORT_TTS_PROVIDER")]
    pub tts_provider: Option<String>,
    /// Upstream TTS API base URL.
    #[arg(long, env = "WIREPORT_TTS_BASE_URL")]
    pub tts_base_url: Option<String>,
    /// Upstream TTS API key.
    #[arg(long, env = "WIREPORT_TTS_API_KEY")]
    pub tts_api_key: Option<String>,
    /// Default TTS voice.
    #[arg(long, env = "WIREPORT_TTS_VOICE")]
    pub tts_voice: Option<String>,

    /// LLM provider name (e.g. "anthropic").
    #[arg(long, env = "WIREPORT_LLM_PROVIDER")]
    pub llm_provider: Option<String>,
    /// LLM API base URL.
    #[arg(long, env = "WIREPORT_LLM_BASE_URL")]
    pub llm_base_url: Option<String>,
    /// LLM API key.
    #[arg(long, env = "WIREPORT_LLM_API_KEY")]
    pub llm_api_key: Option<String>,
    /// LLM model identifier.
    #[arg(long, env = "WIREPORT_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Default terminal columns for newly created sessions.
    #[arg(long, env = "WIREPORT_COLS", default_value = "80")]
    pub cols: u16,
    /// Default terminal rows for newly created sessions.
    #[arg(long, env = "WIREPORT_ROWS", default_value = "24")]
    pub rows: u16,
    /// `historyRing` capacity in bytes, per session.
    #[arg(long, env = "WIREPORT_RING_SIZE", default_value = "262144")]
    pub ring_size: usize,

    /// Log format (json or text).
    #[arg(long, env = "WIREPORT_LOG_FORMAT", default_value = "json")]
    pub log_format: String,
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WIREPORT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rendezvous_url.trim().is_empty() {
            anyhow::bail!("--rendezvous-url must not be empty");
        }
        if self.registration_key.trim().is_empty() {
            anyhow::bail!("--registration-key must not be empty");
        }
        if self.cols == 0 || self.rows == 0 {
            anyhow::bail!("--cols and --rows must be non-zero");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    pub fn tunnel_json_path(&self) -> PathBuf {
        self.state_dir.join("tunnel.json")
    }

    pub fn sessions_json_path(&self) -> PathBuf {
        self.state_dir.join("sessions.json")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
