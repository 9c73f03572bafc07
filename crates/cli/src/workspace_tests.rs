// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn clone_reports_failure_for_unreachable_url() {
    let dir = tempfile::tempdir().unwrap();
    let manager = WorkspaceManager::new(dir.path().to_path_buf());
    let err = manager.clone("file:///nonexistent/repo.git", "checkout").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ProcessError);
}

#[tokio::test]
async fn create_worktree_reports_failure_for_non_repo() {
    let dir = tempfile::tempdir().unwrap();
    let manager = WorkspaceManager::new(dir.path().to_path_buf());
    let err = manager.create_worktree(dir.path(), "wt", "main").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ProcessError);
}
