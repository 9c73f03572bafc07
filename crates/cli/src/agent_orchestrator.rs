// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AgentOrchestrator: binds transcribed or typed text to an LLM or a
//! headless agent process.
//!
//! Supervisor mode is a single, process-wide conversational agent reached
//! over `/agent/ws`: audio in (STT) or text in, a streamed LLM reply out
//! as `chunk` frames followed by `complete`. Per-session mode answers
//! `execute(command, sessionId?)`: a headless session gets the command
//! relayed to its stdin, anything else goes to the LLM with a small tool
//! surface over SessionRegistry and WorkspaceManager.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::error::{ErrorCode, GatewayError};
use crate::model::TerminalType;
use crate::proxy::ProxyLayer;
use crate::session_registry::SessionRegistry;
use crate::workspace::WorkspaceManager;

const CHAT_COMPLETIONS_TIMEOUT: Duration = Duration::from_secs(120);
/// Rough token budget for supervisor conversation history, approximated at
/// 4 characters per token since we don't carry a tokenizer dependency.
const HISTORY_TOKEN_BUDGET: usize = 8_000;
const MAX_TOOL_HOPS: u32 = 4;

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Turn {
    role: String,
    content: String,
}

/// Conversation history capped by an approximate token budget; oldest
/// turns are evicted first once the cap is exceeded.
#[derive(Default)]
struct History {
    turns: VecDeque<Turn>,
}

impl History {
    fn push(&mut self, role: &str, content: String) {
        self.turns.push_back(Turn { role: role.to_owned(), content });
        while self.approx_tokens() > HISTORY_TOKEN_BUDGET && self.turns.len() > 1 {
            self.turns.pop_front();
        }
    }

    fn approx_tokens(&self) -> usize {
        self.turns.iter().map(|t| t.content.len() / 4).sum()
    }

    fn clear(&mut self) {
        self.turns.clear();
    }

    fn as_messages(&self, system: Option<&str>) -> Vec<Value> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(self.turns.iter().map(|t| json!({ "role": t.role, "content": t.content })));
        messages
    }
}

/// Frames emitted on the Supervisor-mode `/agent/ws` socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorFrame {
    Transcription { text: String },
    Chunk { text: String },
    Complete {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_format: Option<String>,
    },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteOutput {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub struct AgentOrchestrator {
    llm: LlmConfig,
    http: reqwest::Client,
    proxy: Option<Arc<ProxyLayer>>,
    registry: Arc<SessionRegistry>,
    workspace: Arc<WorkspaceManager>,
    supervisor_history: Mutex<History>,
}

impl AgentOrchestrator {
    pub fn new(
        llm: LlmConfig,
        proxy: Option<Arc<ProxyLayer>>,
        registry: Arc<SessionRegistry>,
        workspace: Arc<WorkspaceManager>,
    ) -> Self {
        Self {
            llm,
            http: reqwest::Client::builder().timeout(CHAT_COMPLETIONS_TIMEOUT).build().unwrap_or_default(),
            proxy,
            registry,
            workspace,
            supervisor_history: Mutex::new(History::default()),
        }
    }

    pub async fn reset_context(&self) {
        self.supervisor_history.lock().await.clear();
    }

    /// Handle one turn of Supervisor-mode audio input: transcribe, then
    /// drive the same path as text input. Frames are pushed onto `out`;
    /// errors become `SupervisorFrame::Error` without closing the caller's
    /// socket.
    pub async fn handle_audio_turn(&self, audio_b64: &str, language: Option<&str>, out: &mpsc::Sender<SupervisorFrame>) {
        let Some(proxy) = &self.proxy else {
            let _ = out.send(SupervisorFrame::Error { message: "stt not configured".to_owned() }).await;
            return;
        };
        match proxy.transcribe_direct(audio_b64, language).await {
            Ok(text) => {
                let _ = out.send(SupervisorFrame::Transcription { text: text.clone() }).await;
                self.handle_text_turn(text, out).await;
            }
            Err(e) => {
                let _ = out.send(SupervisorFrame::Error { message: e.to_string() }).await;
            }
        }
    }

    /// Handle one turn of Supervisor-mode text input: stream an LLM reply
    /// as `chunk` frames, then a `complete` frame (optionally carrying
    /// synthesized speech for the final text).
    pub async fn handle_text_turn(&self, text: String, out: &mpsc::Sender<SupervisorFrame>) {
        {
            let mut history = self.supervisor_history.lock().await;
            history.push("user", text);
        }

        let messages = {
            let history = self.supervisor_history.lock().await;
            history.as_messages(Some("You are a helpful terminal assistant running on the user's laptop."))
        };

        let reply = match self.stream_chat_completion(messages, out).await {
            Ok(text) => text,
            Err(e) => {
                let _ = out.send(SupervisorFrame::Error { message: e.to_string() }).await;
                return;
            }
        };

        {
            let mut history = self.supervisor_history.lock().await;
            history.push("assistant", reply.clone());
        }

        let (audio, audio_format) = match &self.proxy {
            Some(proxy) => match proxy.synthesize_direct(&reply, None, None, None).await {
                Ok((audio, format)) => (Some(audio), Some(format)),
                Err(e) => {
                    warn!(err = %e, "tts synthesis failed for supervisor reply, sending text only");
                    (None, None)
                }
            },
            None => (None, None),
        };

        let _ = out.send(SupervisorFrame::Complete { text: reply, audio, audio_format }).await;
    }

    /// `POST {base_url}/chat/completions` with `stream: true`, forwarding
    /// each text delta as a `chunk` frame and returning the assembled text.
    async fn stream_chat_completion(&self, messages: Vec<Value>, out: &mpsc::Sender<SupervisorFrame>) -> anyhow::Result<String> {
        let base = self.llm.base_url.as_deref().ok_or_else(|| anyhow::anyhow!("llm provider not configured"))?;
        let model = self.llm.model.as_deref().unwrap_or("gpt-4o-mini");

        let mut req = self
            .http
            .post(format!("{base}/chat/completions"))
            .header("Accept", "text/event-stream")
            .json(&json!({ "model": model, "messages": messages, "stream": true }));
        if let Some(key) = &self.llm.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("llm upstream error {status}: {body}");
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_text = String::new();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk?));
            while let Some(idx) = buffer.find('\n') {
                let line = buffer[..idx].trim_end_matches('\r').to_owned();
                buffer.drain(..=idx);
                let Some(data) = line.strip_prefix("data: ") else { continue };
                if data == "[DONE]" {
                    continue;
                }
                let Ok(event) = serde_json::from_str::<Value>(data) else { continue };
                let delta = event
                    .pointer("/choices/0/delta/content")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !delta.is_empty() {
                    full_text.push_str(delta);
                    let _ = out.send(SupervisorFrame::Chunk { text: delta.to_owned() }).await;
                }
            }
        }

        Ok(full_text)
    }

    /// Per-session `execute`. Headless sessions get the command relayed to
    /// stdin (the assistant reply streams separately through OutputRouter's
    /// `chat_message`/`recording_output` frames); everything else goes to
    /// the LLM with a small tool surface.
    pub async fn execute(&self, command: &str, session_id: Option<&str>) -> Result<ExecuteOutput, GatewayError> {
        if let Some(id) = session_id {
            if let Some(descriptor) = self.registry.get_descriptor(id).await {
                if descriptor.terminal_type.is_headless() {
                    self.registry.execute_command(id, command).await?;
                    return Ok(ExecuteOutput { output: String::new(), session_id: Some(id.to_owned()) });
                }
            }
        }

        self.execute_via_llm(command, session_id)
            .await
            .map_err(|e| GatewayError::new(ErrorCode::UpstreamError, e.to_string()))
    }

    async fn execute_via_llm(&self, command: &str, session_id: Option<&str>) -> anyhow::Result<ExecuteOutput> {
        let base = self.llm.base_url.as_deref().ok_or_else(|| anyhow::anyhow!("llm provider not configured"))?;
        let model = self.llm.model.as_deref().unwrap_or("gpt-4o-mini");

        let mut messages = vec![json!({
            "role": "system",
            "content": "You can manage terminal sessions and git workspaces via the provided tools.",
        })];
        messages.push(json!({ "role": "user", "content": command }));

        for _ in 0..MAX_TOOL_HOPS {
            let mut req = self.http.post(format!("{base}/chat/completions")).json(&json!({
                "model": model,
                "messages": messages,
                "tools": tool_definitions(),
            }));
            if let Some(key) = &self.llm.api_key {
                req = req.bearer_auth(key);
            }

            let response = req.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                anyhow::bail!("llm upstream error {status}");
            }
            let body: Value = response.json().await?;
            let message = body.pointer("/choices/0/message").cloned().unwrap_or(Value::Null);
            let tool_calls = message.get("tool_calls").and_then(Value::as_array).cloned().unwrap_or_default();

            if tool_calls.is_empty() {
                let text = message.get("content").and_then(Value::as_str).unwrap_or_default().to_owned();
                return Ok(ExecuteOutput { output: text, session_id: session_id.map(str::to_owned) });
            }

            messages.push(message.clone());
            for call in &tool_calls {
                let id = call.get("id").and_then(Value::as_str).unwrap_or_default().to_owned();
                let name = call.pointer("/function/name").and_then(Value::as_str).unwrap_or_default();
                let args_str = call.pointer("/function/arguments").and_then(Value::as_str).unwrap_or("{}");
                let args: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
                let result = self.dispatch_tool(name, &args).await;
                messages.push(json!({ "role": "tool", "tool_call_id": id, "content": result }));
            }
        }

        anyhow::bail!("exceeded maximum tool-call hops")
    }

    async fn dispatch_tool(&self, name: &str, args: &Value) -> String {
        let outcome = match name {
            "create_session" => self.tool_create_session(args).await,
            "list_sessions" => self.tool_list_sessions().await,
            "destroy_session" => self.tool_destroy_session(args).await,
            "exec" => self.tool_exec(args).await,
            "rename_session" => self.tool_rename_session(args).await,
            "clone_repo" => self.tool_clone_repo(args).await,
            "create_worktree" => self.tool_create_worktree(args).await,
            other => Err(format!("unknown tool: {other}")),
        };
        match outcome {
            Ok(value) => value,
            Err(message) => json!({ "error": message }).to_string(),
        }
    }

    async fn tool_create_session(&self, args: &Value) -> Result<String, String> {
        let terminal_type = args
            .get("terminal_type")
            .and_then(Value::as_str)
            .and_then(TerminalType::parse)
            .ok_or_else(|| "terminal_type must be one of regular/cursor_agent/cursor_cli/claude_cli".to_owned())?;
        let working_dir = args.get("working_dir").and_then(Value::as_str).map(str::to_owned);
        let name = args.get("name").and_then(Value::as_str).map(str::to_owned);
        let descriptor = self
            .registry
            .create(terminal_type, working_dir, name)
            .await
            .map_err(|e| e.to_string())?;
        Ok(serde_json::to_string(&descriptor).unwrap_or_default())
    }

    async fn tool_list_sessions(&self) -> Result<String, String> {
        Ok(serde_json::to_string(&self.registry.list().await).unwrap_or_default())
    }

    async fn tool_destroy_session(&self, args: &Value) -> Result<String, String> {
        let id = args.get("session_id").and_then(Value::as_str).ok_or_else(|| "session_id required".to_owned())?;
        self.registry.destroy(id).await.map_err(|e| e.to_string())?;
        Ok(json!({ "destroyed": id }).to_string())
    }

    async fn tool_exec(&self, args: &Value) -> Result<String, String> {
        let id = args.get("session_id").and_then(Value::as_str).ok_or_else(|| "session_id required".to_owned())?;
        let command = args.get("command").and_then(Value::as_str).ok_or_else(|| "command required".to_owned())?;
        self.registry.execute_command(id, command).await.map_err(|e| e.to_string())?;
        Ok(json!({ "dispatched": true }).to_string())
    }

    async fn tool_rename_session(&self, args: &Value) -> Result<String, String> {
        let id = args.get("session_id").and_then(Value::as_str).ok_or_else(|| "session_id required".to_owned())?;
        let name = args.get("name").and_then(Value::as_str).map(str::to_owned);
        self.registry.rename(id, name).await.map_err(|e| e.to_string())?;
        Ok(json!({ "renamed": true }).to_string())
    }

    async fn tool_clone_repo(&self, args: &Value) -> Result<String, String> {
        let url = args.get("url").and_then(Value::as_str).ok_or_else(|| "url required".to_owned())?;
        let name = args.get("name").and_then(Value::as_str).ok_or_else(|| "name required".to_owned())?;
        let path = self.workspace.clone(url, name).await.map_err(|e| e.to_string())?;
        Ok(json!({ "path": path.to_string_lossy() }).to_string())
    }

    async fn tool_create_worktree(&self, args: &Value) -> Result<String, String> {
        let repo = args.get("repo").and_then(Value::as_str).ok_or_else(|| "repo required".to_owned())?;
        let name = args.get("name").and_then(Value::as_str).ok_or_else(|| "name required".to_owned())?;
        let branch = args.get("branch").and_then(Value::as_str).ok_or_else(|| "branch required".to_owned())?;
        let path = self
            .workspace
            .create_worktree(&PathBuf::from(repo), name, branch)
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({ "path": path.to_string_lossy() }).to_string())
    }
}

fn tool_definitions() -> Value {
    json!([
        { "type": "function", "function": { "name": "create_session", "description": "Create a new terminal session.", "parameters": { "type": "object", "properties": { "terminal_type": { "type": "string" }, "working_dir": { "type": "string" }, "name": { "type": "string" } }, "required": ["terminal_type"] } } },
        { "type": "function", "function": { "name": "list_sessions", "description": "List existing terminal sessions.", "parameters": { "type": "object", "properties": {} } } },
        { "type": "function", "function": { "name": "destroy_session", "description": "Destroy a terminal session.", "parameters": { "type": "object", "properties": { "session_id": { "type": "string" } }, "required": ["session_id"] } } },
        { "type": "function", "function": { "name": "exec", "description": "Write a command to a session's stdin.", "parameters": { "type": "object", "properties": { "session_id": { "type": "string" }, "command": { "type": "string" } }, "required": ["session_id", "command"] } } },
        { "type": "function", "function": { "name": "rename_session", "description": "Rename a terminal session.", "parameters": { "type": "object", "properties": { "session_id": { "type": "string" }, "name": { "type": "string" } }, "required": ["session_id"] } } },
        { "type": "function", "function": { "name": "clone_repo", "description": "Clone a git repository into the workspace root.", "parameters": { "type": "object", "properties": { "url": { "type": "string" }, "name": { "type": "string" } }, "required": ["url", "name"] } } },
        { "type": "function", "function": { "name": "create_worktree", "description": "Create a git worktree from an existing repository.", "parameters": { "type": "object", "properties": { "repo": { "type": "string" }, "name": { "type": "string" }, "branch": { "type": "string" } }, "required": ["repo", "name", "branch"] } } },
    ])
}

#[cfg(test)]
#[path = "agent_orchestrator_tests.rs"]
mod tests;
