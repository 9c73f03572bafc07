// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RecordingProcessor: per-session dedup of filtered terminal output into
//! bounded full/delta/raw tuples, plus the parallel accumulation path used
//! for headless agent CLIs.

use crate::output_filter;

/// Cap on `RecordingState::last_output`, in characters.
pub const MAX_LAST_OUTPUT: usize = 10_000;

/// A suffix/containment match at or above this fraction of `current`'s
/// length is considered a re-render of already-seen content.
const SUFFIX_SUPPRESS_RATIO: f64 = 0.90;
const CONTAINED_SUPPRESS_RATIO: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct RecordingOutput {
    pub full_text: String,
    pub delta: String,
    pub raw: String,
}

/// Transient per-session recording state. Reset on every new command
/// submission via `set_last_command`.
#[derive(Debug, Clone, Default)]
pub struct RecordingState {
    last_output: String,
    last_command: Option<String>,
    headless_full_text: String,
    last_headless_delta: String,
    has_broadcast: bool,
}

impl RecordingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all prior state and record the command that triggered it.
    pub fn set_last_command(&mut self, command: &str) {
        *self = Self { last_command: Some(command.trim().to_owned()), ..Self::default() };
    }

    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    /// Filter `raw_chunk` (falling back to `full_screen` if it filters to
    /// nothing), extract the result region, and fold it into `last_output`
    /// using the dedup rules. Returns `None` when the chunk carries no new
    /// information.
    pub fn process_output(&mut self, raw_chunk: &str, full_screen: &[String]) -> Option<RecordingOutput> {
        let last_command = self.last_command.clone();
        let source_lines: Vec<String> = if raw_chunk.trim().is_empty() {
            full_screen.to_vec()
        } else {
            raw_chunk.lines().map(str::to_owned).collect()
        };
        if source_lines.is_empty() {
            return None;
        }

        let raw_filtered = output_filter::filter_lines(&source_lines, last_command.as_deref());
        let result_text = output_filter::extract_result(&source_lines, last_command.as_deref());
        let result_text = result_text.trim();
        if result_text.is_empty() {
            return None;
        }

        if is_suppressed(&self.last_output, result_text) {
            return None;
        }

        let delta = result_text.to_owned();
        let full_text = if self.last_output.is_empty() {
            delta.clone()
        } else {
            format!("{}{}{}", self.last_output, separator_for(&self.last_output), delta)
        };
        self.last_output = cap_front(full_text, MAX_LAST_OUTPUT);

        Some(RecordingOutput { full_text: self.last_output.clone(), delta, raw: raw_filtered })
    }

    /// Append an assistant-text delta produced by the headless parser.
    pub fn accumulate_headless_text(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.headless_full_text.push_str(delta);
        self.last_headless_delta = delta.to_owned();
    }

    pub fn last_headless_delta(&self) -> &str {
        &self.last_headless_delta
    }

    /// Mark the headless run complete and return the accumulated text.
    pub fn complete_headless(&mut self) -> String {
        self.has_broadcast = true;
        std::mem::take(&mut self.headless_full_text)
    }

    pub fn has_broadcast(&self) -> bool {
        self.has_broadcast
    }
}

fn is_suppressed(current: &str, candidate: &str) -> bool {
    if current.is_empty() {
        return false;
    }
    if candidate == current {
        return true;
    }
    let ratio = candidate.len() as f64 / current.len() as f64;
    if current.ends_with(candidate) && ratio >= SUFFIX_SUPPRESS_RATIO {
        return true;
    }
    current.contains(candidate) && ratio >= CONTAINED_SUPPRESS_RATIO
}

fn separator_for(current: &str) -> &'static str {
    match current.trim_end().chars().last() {
        Some('.') | Some('!') | Some('?') => " ",
        _ => "\n\n",
    }
}

fn cap_front(s: String, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s;
    }
    s.chars().skip(len - max_chars).collect()
}

#[cfg(test)]
#[path = "recording_tests.rs"]
mod tests;
