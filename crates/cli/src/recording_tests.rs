// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn repeated_identical_output_emits_once() {
    let mut state = RecordingState::new();
    state.set_last_command("echo hello");

    let first = state.process_output("hello", &[]).expect("first emission");
    assert_eq!(first.delta, "hello");
    assert_eq!(first.full_text, "hello");

    assert!(state.process_output("hello", &[]).is_none());
    assert!(state.process_output("hello", &[]).is_none());
}

#[test]
fn falls_back_to_full_screen_when_raw_chunk_is_blank() {
    let mut state = RecordingState::new();
    state.set_last_command("ls");

    let out = state.process_output("", &["file1".to_owned(), "file2".to_owned()]).expect("emission");
    assert_eq!(out.delta, "file1\nfile2");
}

#[test]
fn new_content_appends_with_blank_line_separator() {
    let mut state = RecordingState::new();
    state.set_last_command("run");

    state.process_output("first result", &[]).expect("first");
    let second = state.process_output("second result", &[]).expect("second");

    assert_eq!(second.delta, "second result");
    assert_eq!(second.full_text, "first result\n\nsecond result");
}

#[test]
fn sentence_ending_punctuation_uses_space_separator() {
    let mut state = RecordingState::new();
    state.set_last_command("run");

    state.process_output("Done.", &[]).expect("first");
    let second = state.process_output("Next step", &[]).expect("second");

    assert_eq!(second.full_text, "Done. Next step");
}

#[test]
fn last_output_is_capped_from_the_front() {
    let mut state = RecordingState::new();
    state.set_last_command("spam");

    state.process_output(&"a".repeat(MAX_LAST_OUTPUT - 10), &[]).expect("seed");
    let grown = state.process_output(&"b".repeat(100), &[]).expect("grow");

    assert!(grown.full_text.chars().count() <= MAX_LAST_OUTPUT);
    assert!(grown.full_text.ends_with(&"b".repeat(100)));
}

#[test]
fn set_last_command_resets_prior_state() {
    let mut state = RecordingState::new();
    state.set_last_command("first");
    state.process_output("some output", &[]).expect("emission");

    state.set_last_command("second");
    let out = state.process_output("some output", &[]).expect("fresh emission after reset");
    assert_eq!(out.full_text, "some output");
}

#[test]
fn suffix_rule_suppresses_a_trailing_subset_of_current() {
    // candidate is a true suffix of current (not identical), covering well
    // over 90% of it — e.g. a scrolled re-render only re-exposing the tail
    // of content already folded into last_output.
    let current = "line one\nline two\nline three";
    let candidate = "ine one\nline two\nline three";
    assert!(candidate.len() as f64 / current.len() as f64 >= SUFFIX_SUPPRESS_RATIO);
    assert!(is_suppressed(current, candidate));
}

#[test]
fn suffix_rule_does_not_suppress_below_the_ratio_threshold() {
    // candidate is a genuine suffix of current but far short of 90% of its
    // length, and not contained-enough either, so it must NOT suppress —
    // otherwise the direction of the rule would swallow real new output.
    let current = "a very long line of prior output that keeps going on";
    let candidate = "on";
    assert!(current.ends_with(candidate));
    assert!(candidate.len() as f64 / current.len() as f64 < SUFFIX_SUPPRESS_RATIO);
    assert!(!is_suppressed(current, candidate));
}

#[test]
fn contained_rule_suppresses_a_near_total_substring_that_is_not_a_suffix() {
    let candidate = "y".repeat(95);
    let current = format!("xx{candidate}xxx");
    assert!(current.contains(&candidate));
    assert!(!current.ends_with(&candidate));
    assert!(candidate.len() as f64 / current.len() as f64 >= CONTAINED_SUPPRESS_RATIO);
    assert!(is_suppressed(&current, &candidate));
}

#[test]
fn unrelated_new_text_is_never_suppressed() {
    let current = "previous command output";
    let candidate = "a completely different result";
    assert!(!is_suppressed(current, candidate));
}

#[test]
fn headless_accumulation_and_completion() {
    let mut state = RecordingState::new();
    state.accumulate_headless_text("Hello, ");
    state.accumulate_headless_text("world.");
    assert_eq!(state.last_headless_delta(), "world.");
    assert!(!state.has_broadcast());

    let full = state.complete_headless();
    assert_eq!(full, "Hello, world.");
    assert!(state.has_broadcast());
}
