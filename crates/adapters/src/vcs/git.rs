// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git CLI adapter

use super::{CommitInfo, VcsAdapter, VcsError};
use crate::subprocess::run_with_timeout;
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Git-based version-control adapter.
///
/// Commits are authored as `rollcron <rollcron@localhost>` regardless of the
/// user's git configuration, and never signed.
#[derive(Clone, Debug)]
pub struct GitAdapter {
    timeout: Duration,
}

impl Default for GitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GitAdapter {
    pub fn new() -> Self {
        Self {
            timeout: crate::env::git_timeout(),
        }
    }

    fn git(&self, path: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(path)
            .args(["-c", "user.name=rollcron"])
            .args(["-c", "user.email=rollcron@localhost"])
            .args(["-c", "commit.gpgsign=false"])
            .args(["-c", "tag.gpgsign=false"])
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    async fn run(&self, cmd: Command, description: &str) -> Result<Output, VcsError> {
        run_with_timeout(cmd, self.timeout, description)
            .await
            .map_err(VcsError::CommandFailed)
    }

    /// Run and require exit status 0.
    async fn run_ok(&self, cmd: Command, description: &str) -> Result<String, VcsError> {
        let output = self.run(cmd, description).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VcsError::CommandFailed(format!(
                "{} exited with {}: {}",
                description,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VcsAdapter for GitAdapter {
    async fn ensure_repo(&self, path: &Path) -> Result<(), VcsError> {
        // Only a repository rooted at `path` is used, never an enclosing one.
        let mut toplevel_cmd = self.git(path);
        toplevel_cmd.args(["rev-parse", "--show-toplevel"]);
        let output = self.run(toplevel_cmd, "git rev-parse").await?;
        if output.status.success() {
            let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if same_dir(Path::new(&toplevel), path).await {
                return Ok(());
            }
            tracing::info!(
                path = %path.display(),
                enclosing = %toplevel,
                "output directory is inside another repository, initializing its own"
            );
        } else {
            tracing::info!(path = %path.display(), "initializing git repository");
        }
        let mut init = self.git(path);
        init.args(["init", "--quiet"]);
        self.run_ok(init, "git init").await.map(|_| ())
    }

    async fn stage_all(&self, path: &Path) -> Result<usize, VcsError> {
        let mut add = self.git(path);
        add.args(["add", "--all", "--", "."]);
        self.run_ok(add, "git add").await?;

        let mut diff = self.git(path);
        diff.args(["diff", "--cached", "--name-only", "--", "."]);
        let names = self.run_ok(diff, "git diff --cached").await?;
        Ok(names.lines().filter(|l| !l.trim().is_empty()).count())
    }

    async fn commit(
        &self,
        path: &Path,
        message: &str,
        allow_empty: bool,
    ) -> Result<String, VcsError> {
        let mut commit = self.git(path);
        commit.args(["commit", "--quiet", "--no-verify", "-m", message]);
        if allow_empty {
            commit.arg("--allow-empty");
        }
        self.run_ok(commit, "git commit").await?;

        self.head(path)
            .await?
            .ok_or_else(|| VcsError::Parse("no HEAD after commit".to_string()))
    }

    async fn head(&self, path: &Path) -> Result<Option<String>, VcsError> {
        let mut cmd = self.git(path);
        cmd.args(["rev-parse", "--verify", "--quiet", "HEAD"]);
        let output = self.run(cmd, "git rev-parse HEAD").await?;
        if !output.status.success() {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!id.is_empty()).then_some(id))
    }

    async fn tag(&self, path: &Path, name: &str, commit: &str) -> Result<(), VcsError> {
        let mut cmd = self.git(path);
        cmd.args(["tag", "--force", name, commit]);
        self.run_ok(cmd, "git tag").await.map(|_| ())
    }

    async fn delete_tag(&self, path: &Path, name: &str) -> Result<(), VcsError> {
        let mut exists = self.git(path);
        exists.args(["rev-parse", "--verify", "--quiet"]);
        exists.arg(format!("refs/tags/{name}"));
        if !self.run(exists, "git rev-parse tag").await?.status.success() {
            return Ok(());
        }

        let mut cmd = self.git(path);
        cmd.args(["tag", "--delete", name]);
        self.run_ok(cmd, "git tag --delete").await.map(|_| ())
    }

    async fn list_tags(
        &self,
        path: &Path,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, VcsError> {
        let mut cmd = self.git(path);
        cmd.args(["tag", "--list", "--format=%(refname:short)%09%(objectname)"]);
        cmd.arg(format!("{prefix}*"));
        let out = self.run_ok(cmd, "git tag --list").await?;
        out.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                line.split_once('\t')
                    .map(|(tag, id)| (tag.to_string(), id.trim().to_string()))
                    .ok_or_else(|| VcsError::Parse(line.to_string()))
            })
            .collect()
    }

    async fn commit_exists(&self, path: &Path, commit: &str) -> Result<bool, VcsError> {
        let mut cmd = self.git(path);
        cmd.args(["cat-file", "-e"]);
        cmd.arg(format!("{commit}^{{commit}}"));
        Ok(self.run(cmd, "git cat-file").await?.status.success())
    }

    async fn recent_commits(&self, path: &Path, limit: usize) -> Result<Vec<CommitInfo>, VcsError> {
        if self.head(path).await?.is_none() {
            return Ok(Vec::new());
        }
        let mut cmd = self.git(path);
        cmd.arg("log")
            .arg(format!("--max-count={limit}"))
            .arg("--format=%H%x09%s")
            .args(["--", "."]);
        let out = self.run_ok(cmd, "git log").await?;
        Ok(out
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .map(|(id, subject)| CommitInfo {
                id: id.to_string(),
                subject: subject.to_string(),
            })
            .collect())
    }
}

async fn same_dir(a: &Path, b: &Path) -> bool {
    match (
        tokio::fs::canonicalize(a).await,
        tokio::fs::canonicalize(b).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
