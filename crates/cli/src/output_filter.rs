// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure functions that turn a rendered terminal screen (or a raw byte
//! chunk still carrying ANSI/CSI/OSC sequences) into denoised text: strip
//! chrome, drop status lines and command echoes, and pull structured
//! "result" regions out of framed boxes.

use std::sync::LazyLock;

use regex::Regex;

static CSI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]").unwrap());
static OSC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\][^\x07\x1b]*(\x07|\x1b\\)").unwrap());
/// SGR dim-intensity segment: ESC[2m ... (content) ... ESC[0m|ESC[22m.
static DIM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[2m[^\x1b]*(\x1b\[(0|22)m)?").unwrap());

/// "<model> \u{b7} <n>%" context-window indicator.
static MODEL_PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)[a-z0-9.\-]+\s*{}\s*\d+%", '\u{b7}')).unwrap());
static TOKEN_COUNTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+[.,]?\d*\s*(k|m)?\s*tokens?\b").unwrap());
/// "\u{2b21}/\u{2b22} <verb>ing" progress hexagon indicator.
static HEX_PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"[{}{}]\s*(\w+ing|thinking|working|cooking|pondering)\b",
        '\u{2b21}', '\u{2b22}'
    ))
    .unwrap()
});

const STATUS_CHROME_LITERALS: &[&str] =
    &["/ commands", "@ files", "! shell", "review edits", "add a follow-up", "ctrl+r"];

const BOX_TOP_LEFT: char = '\u{250c}';
const BOX_TOP_RIGHT: char = '\u{2510}';
const BOX_VERTICAL: char = '\u{2502}';
const BOX_BOTTOM_LEFT: char = '\u{2514}';
const BOX_BOTTOM_RIGHT: char = '\u{2518}';
const PROMPT_CHEVRON: char = '\u{276f}';

fn box_drawing_chars() -> &'static [char] {
    const CHARS: [char; 17] = [
        '\u{250c}', '\u{2510}', '\u{2502}', '\u{2514}', '\u{2518}', '\u{2500}', '\u{2554}',
        '\u{2557}', '\u{2551}', '\u{255a}', '\u{255d}', '\u{2550}', '\u{251c}', '\u{2524}',
        '\u{252c}', '\u{2534}', '\u{253c}',
    ];
    &CHARS
}

/// Strip ANSI/CSI/OSC escape sequences and dim-intensity (SGR 2) segments
/// from a raw chunk of terminal output.
pub fn strip_ansi(raw: &str) -> String {
    let no_dim = DIM_RE.replace_all(raw, "");
    let no_osc = OSC_RE.replace_all(&no_dim, "");
    CSI_RE.replace_all(&no_osc, "").into_owned()
}

/// Whether every non-whitespace character on the line is a box-drawing glyph.
fn is_box_drawing_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.chars().all(|c| c.is_whitespace() || box_drawing_chars().contains(&c))
}

/// Whether the line matches one of the known status-chrome patterns.
fn is_status_chrome(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if STATUS_CHROME_LITERALS.iter().any(|pat| trimmed.to_lowercase().contains(pat)) {
        return true;
    }
    MODEL_PERCENT_RE.is_match(trimmed)
        || TOKEN_COUNTER_RE.is_match(trimmed)
        || HEX_PROGRESS_RE.is_match(trimmed)
}

/// Whether `line` equals or trivially echoes `last_command`.
fn is_command_echo(line: &str, last_command: Option<&str>) -> bool {
    let Some(cmd) = last_command else { return false };
    if cmd.is_empty() {
        return false;
    }
    let trimmed = line.trim();
    if trimmed == cmd {
        return true;
    }
    trimmed.trim_start_matches(['>', '$', '#', PROMPT_CHEVRON]).trim() == cmd
}

/// Drop ANSI/chrome/status/echo noise from rendered lines, returning the
/// surviving lines joined by `\n`.
pub fn filter_lines(lines: &[String], last_command: Option<&str>) -> String {
    lines
        .iter()
        .map(|l| strip_ansi(l))
        .filter(|l| !is_box_drawing_line(l))
        .filter(|l| !is_status_chrome(l))
        .filter(|l| !is_command_echo(l, last_command))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A framed box's inner content: lines between a top border and a bottom
/// border, with the vertical side borders stripped.
pub fn extract_framed_boxes(lines: &[String]) -> Vec<String> {
    let mut boxes = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let top = lines[i].trim();
        if top.starts_with(BOX_TOP_LEFT) && top.ends_with(BOX_TOP_RIGHT) {
            let mut inner = Vec::new();
            let mut j = i + 1;
            while j < lines.len() {
                let trimmed = lines[j].trim();
                if trimmed.starts_with(BOX_BOTTOM_LEFT) && trimmed.ends_with(BOX_BOTTOM_RIGHT) {
                    break;
                }
                if let Some(stripped) = trimmed
                    .strip_prefix(BOX_VERTICAL)
                    .and_then(|s| s.strip_suffix(BOX_VERTICAL))
                {
                    inner.push(stripped.trim().to_owned());
                } else {
                    inner.push(trimmed.to_owned());
                }
                j += 1;
            }
            if j < lines.len() {
                boxes.push(inner.join("\n").trim().to_owned());
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    boxes
}

/// Structured extraction preferred over free-text filtering when framed
/// boxes are present.
pub fn extract_result(lines: &[String], last_command: Option<&str>) -> String {
    let boxes = extract_framed_boxes(lines);
    let non_empty: Vec<&String> = boxes.iter().filter(|b| !b.is_empty()).collect();
    if let Some(last) = non_empty.last() {
        return (*last).clone();
    }
    filter_lines(lines, last_command)
}

#[cfg(test)]
#[path = "output_filter_tests.rs"]
mod tests;
