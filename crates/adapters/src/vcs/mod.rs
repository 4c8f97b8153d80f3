// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version-control adapters

mod git;

pub use git::GitAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeVcsAdapter, VcsCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from version-control operations
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("unexpected output: {0}")]
    Parse(String),
}

/// A commit as listed by [`VcsAdapter::recent_commits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub subject: String,
}

/// Adapter for the repository that holds a job's output directory
#[async_trait]
pub trait VcsAdapter: Clone + Send + Sync + 'static {
    /// Initialize a repository at `path` unless `path` is already the top
    /// level of one. A repository enclosing `path` is never used.
    async fn ensure_repo(&self, path: &Path) -> Result<(), VcsError>;

    /// Stage every change under `path`. Returns the number of staged files.
    async fn stage_all(&self, path: &Path) -> Result<usize, VcsError>;

    /// Commit the staged changes and return the new commit id.
    async fn commit(&self, path: &Path, message: &str, allow_empty: bool)
        -> Result<String, VcsError>;

    /// Current HEAD commit, `None` in a repository without commits.
    async fn head(&self, path: &Path) -> Result<Option<String>, VcsError>;

    /// Create (or move) lightweight tag `name` at `commit`.
    async fn tag(&self, path: &Path, name: &str, commit: &str) -> Result<(), VcsError>;

    /// Delete tag `name`. Deleting a missing tag succeeds.
    async fn delete_tag(&self, path: &Path, name: &str) -> Result<(), VcsError>;

    /// Tags starting with `prefix`, as `(tag, commit)` pairs.
    async fn list_tags(&self, path: &Path, prefix: &str)
        -> Result<Vec<(String, String)>, VcsError>;

    async fn commit_exists(&self, path: &Path, commit: &str) -> Result<bool, VcsError>;

    /// Newest-first commits touching `path`, at most `limit`.
    async fn recent_commits(&self, path: &Path, limit: usize)
        -> Result<Vec<CommitInfo>, VcsError>;
}
