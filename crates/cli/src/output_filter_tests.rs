// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn strips_csi_and_dim_segments() {
    let raw = "\x1b[2mfaint\x1b[0mvisible\x1b[1mvalue\x1b[0m";
    assert_eq!(strip_ansi(raw), "visiblevalue");
}

#[test]
fn strips_osc_sequences() {
    let raw = "\x1b]0;window title\x07visible text";
    assert_eq!(strip_ansi(raw), "visible text");
}

#[test]
fn drops_box_drawing_only_lines() {
    let lines = vec!["\u{2500}\u{2500}\u{2500}".to_owned(), "real content".to_owned()];
    assert_eq!(filter_lines(&lines, None), "real content");
}

#[test]
fn drops_status_chrome_lines() {
    let lines = vec![
        "claude-opus \u{b7} 42%".to_owned(),
        "12.3k tokens".to_owned(),
        "\u{2b21} thinking".to_owned(),
        "/ commands  @ files  ! shell".to_owned(),
        "keep me".to_owned(),
    ];
    assert_eq!(filter_lines(&lines, None), "keep me");
}

#[test]
fn drops_command_echo_line() {
    let lines = vec!["\u{276f} ls -la".to_owned(), "file1".to_owned(), "file2".to_owned()];
    assert_eq!(filter_lines(&lines, Some("ls -la")), "file1\nfile2");
}

#[test]
fn extracts_framed_box_inner_content() {
    let lines = vec![
        "\u{250c}\u{2500}\u{2500}\u{2500}\u{2510}".to_owned(),
        "\u{2502} hello \u{2502}".to_owned(),
        "\u{2514}\u{2500}\u{2500}\u{2500}\u{2518}".to_owned(),
    ];
    let boxes = extract_framed_boxes(&lines);
    assert_eq!(boxes, vec!["hello".to_owned()]);
}

#[test]
fn extract_result_prefers_last_non_empty_box() {
    let lines = vec![
        "\u{250c}\u{2500}\u{2510}".to_owned(),
        "\u{2502} first \u{2502}".to_owned(),
        "\u{2514}\u{2500}\u{2518}".to_owned(),
        "\u{250c}\u{2500}\u{2510}".to_owned(),
        "\u{2502} second \u{2502}".to_owned(),
        "\u{2514}\u{2500}\u{2518}".to_owned(),
    ];
    assert_eq!(extract_result(&lines, None), "second");
}

#[test]
fn extract_result_falls_back_to_filtered_lines_without_boxes() {
    let lines = vec!["plain output".to_owned()];
    assert_eq!(extract_result(&lines, None), "plain output");
}
