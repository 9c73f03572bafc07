// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WorkspaceManager: thin git/worktree shell-out wrappers consumed by
//! AgentOrchestrator's tool surface. Not a full git client — just enough
//! to clone a repository and materialize a worktree for a new session.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{ErrorCode, GatewayError};

const GIT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `git clone <url> <root>/<name>`. Returns the absolute path cloned into.
    pub async fn clone(&self, url: &str, name: &str) -> Result<PathBuf, GatewayError> {
        let dest = self.root.join(name);
        let (code, _stdout, stderr) =
            run_git(&self.root, &["clone", url, dest.to_string_lossy().as_ref()]).await?;
        if code != 0 {
            return Err(GatewayError::new(ErrorCode::ProcessError, format!("git clone failed: {stderr}")));
        }
        Ok(dest)
    }

    /// `git -C <repo> worktree add <root>/<name> <branch>`. Returns the new worktree path.
    pub async fn create_worktree(&self, repo: &Path, name: &str, branch: &str) -> Result<PathBuf, GatewayError> {
        let dest = self.root.join(name);
        let (code, _stdout, stderr) =
            run_git(repo, &["worktree", "add", dest.to_string_lossy().as_ref(), branch]).await?;
        if code != 0 {
            return Err(GatewayError::new(ErrorCode::ProcessError, format!("git worktree add failed: {stderr}")));
        }
        Ok(dest)
    }
}

async fn run_git(directory: &Path, args: &[&str]) -> Result<(i32, String, String), GatewayError> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .current_dir(directory)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_EDITOR", "true")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| GatewayError::new(ErrorCode::ProcessError, format!("failed to spawn git: {e}")))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(s) = stdout.as_mut() {
            let _ = s.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(s) = stderr.as_mut() {
            let _ = s.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = tokio::select! {
        status = child.wait() => status,
        _ = tokio::time::sleep(GIT_TIMEOUT) => {
            let _ = child.kill().await;
            child.wait().await
        }
    };

    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();
    let code = status.ok().and_then(|s| s.code()).unwrap_or(1);
    Ok((code, String::from_utf8_lossy(&stdout_bytes).into_owned(), String::from_utf8_lossy(&stderr_bytes).into_owned()))
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
