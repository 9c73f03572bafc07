// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-level and persisted data types shared across the gateway.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Persisted tunnel identity, restored on restart so the same `tunnel_id`
/// is reclaimed from the rendezvous server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelIdentity {
    pub tunnel_id: String,
    pub registration_key: String,
    pub public_url: String,
    pub ws_url: String,
    /// Locally generated secret required on every inbound proxied request.
    pub laptop_auth_key: String,
    pub created_at: u64,
}

/// Terminal types this gateway is willing to spawn. Anything else is a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalType {
    Regular,
    CursorAgent,
    CursorCli,
    ClaudeCli,
}

impl TerminalType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(Self::Regular),
            "cursor_agent" => Some(Self::CursorAgent),
            "cursor_cli" => Some(Self::CursorCli),
            "claude_cli" => Some(Self::ClaudeCli),
            _ => None,
        }
    }

    /// Headlessness is a property of the type, not the runtime.
    pub fn is_headless(self) -> bool {
        matches!(self, Self::CursorCli | Self::ClaudeCli)
    }

    /// The command + args used to spawn the child process.
    pub fn spawn_command(self) -> (String, Vec<String>) {
        match self {
            Self::Regular => {
                let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_owned());
                (shell, vec![])
            }
            Self::CursorAgent => ("cursor-agent".to_owned(), vec![]),
            Self::CursorCli => {
                ("cursor-agent".to_owned(), vec!["--output-format".to_owned(), "stream-json".to_owned()])
            }
            Self::ClaudeCli => {
                ("claude".to_owned(), vec!["--output-format".to_owned(), "stream-json".to_owned()])
            }
        }
    }
}

/// Persisted descriptor for a terminal session. Survives the PTY itself;
/// the PTY is respawned lazily from the descriptor on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub terminal_type: TerminalType,
    pub working_dir: Option<String>,
    pub name: Option<String>,
    pub cols: u16,
    pub rows: u16,
    pub created_at: u64,
}

/// A device-scoped ephemeral credential minted by KeyIssuer.
#[derive(Debug, Clone)]
pub struct EphemeralKey {
    pub device_id: String,
    pub stt_key: String,
    pub tts_key: String,
    pub stt_provider: Option<String>,
    pub tts_provider: Option<String>,
    pub permissions: HashSet<Permission>,
    pub issued_at: u64,
    pub expires_at: u64,
    pub ref_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Stt,
    Tts,
}

/// A single turn in a session's or socket's chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: ChatMessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChatMessageMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageKind {
    User,
    Assistant,
    Tool,
    System,
    Error,
    TtsAudio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatMessageMetadata {
    Tool { tool_name: String, tool_input: serde_json::Value, tool_output: Option<serde_json::Value> },
    Thinking { thinking: String },
    Error { error_code: String, stack_trace: Option<String> },
    TtsAudio { tts_text: String, audio_file_path: String },
}

/// Per-session, per-device TTS settings, consumed (and cleared) at the
/// completion of the command that triggered them.
#[derive(Debug, Clone, Default)]
pub struct TtsSettings {
    pub enabled: bool,
    pub speed: Option<f32>,
    pub language: Option<String>,
}

/// A frame received from the rendezvous tunnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    HttpRequest {
        request_id: String,
        method: String,
        path: String,
        #[serde(default)]
        headers: std::collections::HashMap<String, String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        query: std::collections::HashMap<String, String>,
    },
    TerminalInput {
        #[serde(rename = "sessionId")]
        session_id: String,
        data: String,
    },
}

/// A frame sent to the rendezvous tunnel (or mirrored to localhost
/// websocket listeners).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    HttpResponse {
        request_id: String,
        status_code: u16,
        body: String,
    },
    TerminalOutput {
        #[serde(rename = "sessionId")]
        session_id: String,
        data: String,
    },
    RecordingOutput {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
        delta: String,
        raw: String,
        timestamp: u64,
        #[serde(rename = "isComplete")]
        is_complete: bool,
        #[serde(rename = "isTTSReady", default, skip_serializing_if = "Option::is_none")]
        is_tts_ready: Option<bool>,
    },
    TtsAudio {
        session_id: String,
        audio: String,
        format: String,
        text: String,
        timestamp: u64,
    },
    ChatMessage {
        session_id: String,
        message: ChatMessage,
        timestamp: u64,
    },
}

pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
