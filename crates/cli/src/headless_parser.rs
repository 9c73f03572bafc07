// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HeadlessParser: turns newline-delimited JSON emitted by headless agent
//! CLIs into typed chat messages and completion signals. Recognizes two
//! dialects without the caller needing to know which one a given CLI
//! speaks, and never errors on unrecognized input.

use serde_json::Value;
use uuid::Uuid;

use crate::model::{ChatMessage, ChatMessageKind, ChatMessageMetadata};

/// Result of parsing a single line of headless CLI output.
#[derive(Debug, Clone, Default)]
pub struct ParsedLine {
    pub message: Option<ChatMessage>,
    pub session_id: Option<String>,
    pub is_complete: bool,
}

/// Parse one line of a headless agent's stdout. Returns `None` for blank
/// or non-JSON lines; this is not an error condition.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let json: Value = serde_json::from_str(trimmed).ok()?;

    let session_id = extract_session_id(&json);
    let is_complete = is_completion_sentinel(&json);
    let message = parse_dialect_a(&json).or_else(|| parse_dialect_b(&json));

    Some(ParsedLine { message, session_id, is_complete })
}

/// Session id lives at any of `session_id`, `sessionId`,
/// `message.session_id`, or `result.session_id`.
fn extract_session_id(json: &Value) -> Option<String> {
    json.get("session_id")
        .or_else(|| json.get("sessionId"))
        .or_else(|| json.get("message").and_then(|m| m.get("session_id")))
        .or_else(|| json.get("result").and_then(|r| r.get("session_id")))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
}

fn is_completion_sentinel(json: &Value) -> bool {
    json.get("type").and_then(|v| v.as_str()) == Some("result")
}

/// Dialect A: a bare `role` field (`user`/`assistant`), content either a
/// string or an array of `{type:"text", text}` blocks.
fn parse_dialect_a(json: &Value) -> Option<ChatMessage> {
    let role = json.get("role").and_then(|v| v.as_str())?;
    let kind = match role {
        "user" => ChatMessageKind::User,
        "assistant" => ChatMessageKind::Assistant,
        _ => return None,
    };
    let text = extract_text(json.get("content")?)?;
    Some(new_message(kind, text, None))
}

/// Dialect B: a `type` field distinguishing
/// `user`/`assistant`/`tool`/`tool_use`/`tool_result`/`system`/`error`/`result`.
fn parse_dialect_b(json: &Value) -> Option<ChatMessage> {
    let ty = json.get("type").and_then(|v| v.as_str())?;
    match ty {
        "user" | "assistant" => {
            let kind = if ty == "user" { ChatMessageKind::User } else { ChatMessageKind::Assistant };
            let content = json.get("message").and_then(|m| m.get("content")).or_else(|| json.get("content"))?;
            let text = extract_text(content)?;
            Some(new_message(kind, text, None))
        }
        "tool_use" | "tool" => {
            let tool_name = json
                .get("name")
                .or_else(|| json.get("tool_name"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_owned();
            let tool_input = json.get("input").or_else(|| json.get("tool_input")).cloned().unwrap_or(Value::Null);
            let metadata =
                ChatMessageMetadata::Tool { tool_name: tool_name.clone(), tool_input, tool_output: None };
            Some(new_message(ChatMessageKind::Tool, tool_name, Some(metadata)))
        }
        "tool_result" => {
            let tool_name =
                json.get("tool_name").and_then(|v| v.as_str()).unwrap_or("unknown").to_owned();
            let tool_output = json.get("output").or_else(|| json.get("content")).cloned();
            let metadata = ChatMessageMetadata::Tool {
                tool_name: tool_name.clone(),
                tool_input: Value::Null,
                tool_output,
            };
            Some(new_message(ChatMessageKind::Tool, tool_name, Some(metadata)))
        }
        "system" => {
            let text = json.get("content").and_then(|v| v.as_str()).unwrap_or("").to_owned();
            if text.is_empty() {
                return None;
            }
            Some(new_message(ChatMessageKind::System, text, None))
        }
        "error" => {
            let error_code =
                json.get("error_code").and_then(|v| v.as_str()).unwrap_or("unknown").to_owned();
            let stack_trace = json.get("stack_trace").and_then(|v| v.as_str()).map(str::to_owned);
            let text = json.get("message").and_then(|v| v.as_str()).unwrap_or(&error_code).to_owned();
            let metadata = ChatMessageMetadata::Error { error_code, stack_trace };
            Some(new_message(ChatMessageKind::Error, text, Some(metadata)))
        }
        // "result" carries no chat payload; its only signal is completion.
        _ => None,
    }
}

fn extract_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(|v| v.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.join("\n"))
            }
        }
        _ => None,
    }
}

fn new_message(kind: ChatMessageKind, content: String, metadata: Option<ChatMessageMetadata>) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4().to_string(),
        timestamp: crate::model::epoch_millis(),
        kind,
        content,
        metadata,
    }
}

#[cfg(test)]
#[path = "headless_parser_tests.rs"]
mod tests;
