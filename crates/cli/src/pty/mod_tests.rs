// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::model::{SessionDescriptor, TerminalType};

use super::*;

fn descriptor(terminal_type: TerminalType) -> SessionDescriptor {
    SessionDescriptor {
        session_id: "s1".to_owned(),
        terminal_type,
        working_dir: None,
        name: None,
        cols: 80,
        rows: 24,
        created_at: 0,
    }
}

#[tokio::test]
async fn spawned_session_runs_and_produces_output() {
    let descriptor = SessionDescriptor {
        terminal_type: TerminalType::Regular,
        ..descriptor(TerminalType::Regular)
    };
    // Use a deterministic shell invocation rather than the user's $SHELL.
    std::env::set_var("SHELL", "/bin/sh");
    let session = PtySession::spawn(descriptor, 4096).expect("spawn");
    let mut rx = session.subscribe();

    session.write(bytes::Bytes::from_static(b"echo hi\n")).await.expect("write");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut seen = Vec::new();
    while tokio::time::Instant::now() < deadline {
        if let Ok(Ok(chunk)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            seen.extend_from_slice(&chunk);
            if seen.windows(2).any(|w| w == b"hi") {
                break;
            }
        }
    }
    assert!(String::from_utf8_lossy(&seen).contains("hi"));

    session.destroy().await;
    assert_eq!(session.state(), PtyState::Dead);
}

#[tokio::test]
async fn destroy_transitions_to_dead_within_grace() {
    std::env::set_var("SHELL", "/bin/sh");
    let session = PtySession::spawn(descriptor(TerminalType::Regular), 4096).expect("spawn");
    let start = tokio::time::Instant::now();
    session.destroy().await;
    assert!(start.elapsed() < TERMINATE_GRACE + Duration::from_secs(2));
    assert_eq!(session.state(), PtyState::Dead);
}

#[tokio::test]
async fn write_after_destroy_is_rejected() {
    std::env::set_var("SHELL", "/bin/sh");
    let session = PtySession::spawn(descriptor(TerminalType::Regular), 4096).expect("spawn");
    session.destroy().await;
    let result = session.write(bytes::Bytes::from_static(b"x")).await;
    assert!(result.is_err());
}
