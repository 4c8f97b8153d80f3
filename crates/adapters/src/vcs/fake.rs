// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake version-control adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CommitInfo, VcsAdapter, VcsError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded VCS call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    EnsureRepo { path: PathBuf },
    StageAll { path: PathBuf },
    Commit { path: PathBuf, message: String, allow_empty: bool },
    Tag { path: PathBuf, name: String, commit: String },
    DeleteTag { path: PathBuf, name: String },
}

#[derive(Debug, Default)]
struct FakeRepo {
    /// Oldest first
    commits: Vec<CommitInfo>,
    tags: BTreeMap<String, String>,
    staged: usize,
}

struct FakeVcsState {
    repos: HashMap<PathBuf, FakeRepo>,
    calls: Vec<VcsCall>,
    /// Files reported changed by each `stage_all` unless overridden
    changes_per_stage: usize,
    next_changes: Option<usize>,
    fail_ops: HashSet<&'static str>,
    next_commit: u64,
}

/// In-memory repository keyed by path.
#[derive(Clone)]
pub struct FakeVcsAdapter {
    inner: Arc<Mutex<FakeVcsState>>,
}

impl Default for FakeVcsAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeVcsState {
                repos: HashMap::new(),
                calls: Vec::new(),
                changes_per_stage: 1,
                next_changes: None,
                fail_ops: HashSet::new(),
                next_commit: 1,
            })),
        }
    }
}

impl FakeVcsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<VcsCall> {
        self.inner.lock().calls.clone()
    }

    /// Files reported by every subsequent `stage_all`.
    pub fn set_changes_per_stage(&self, n: usize) {
        self.inner.lock().changes_per_stage = n;
    }

    /// Files reported by the next `stage_all` only.
    pub fn set_next_changes(&self, n: usize) {
        self.inner.lock().next_changes = Some(n);
    }

    /// Make operation `op` (`"commit"`, `"tag"`, `"delete_tag"`, ...) fail until cleared.
    pub fn fail(&self, op: &'static str) {
        self.inner.lock().fail_ops.insert(op);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().fail_ops.clear();
    }

    pub fn tags(&self, path: &Path) -> BTreeMap<String, String> {
        self.inner
            .lock()
            .repos
            .get(path)
            .map(|r| r.tags.clone())
            .unwrap_or_default()
    }

    pub fn commit_count(&self, path: &Path) -> usize {
        self.inner
            .lock()
            .repos
            .get(path)
            .map(|r| r.commits.len())
            .unwrap_or(0)
    }

    /// Add a commit directly, as if made outside the adapter.
    pub fn add_commit(&self, path: &Path, subject: &str) -> String {
        let mut state = self.inner.lock();
        let id = format!("{:040x}", state.next_commit);
        state.next_commit += 1;
        state.repos.entry(path.to_owned()).or_default().commits.push(CommitInfo {
            id: id.clone(),
            subject: subject.to_string(),
        });
        id
    }

    fn check(state: &FakeVcsState, op: &'static str) -> Result<(), VcsError> {
        if state.fail_ops.contains(op) {
            return Err(VcsError::CommandFailed(format!("injected {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl VcsAdapter for FakeVcsAdapter {
    async fn ensure_repo(&self, path: &Path) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::EnsureRepo {
            path: path.to_owned(),
        });
        Self::check(&state, "ensure_repo")?;
        state.repos.entry(path.to_owned()).or_default();
        Ok(())
    }

    async fn stage_all(&self, path: &Path) -> Result<usize, VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::StageAll {
            path: path.to_owned(),
        });
        Self::check(&state, "stage_all")?;
        let n = state.next_changes.take().unwrap_or(state.changes_per_stage);
        state.repos.entry(path.to_owned()).or_default().staged = n;
        Ok(n)
    }

    async fn commit(
        &self,
        path: &Path,
        message: &str,
        allow_empty: bool,
    ) -> Result<String, VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::Commit {
            path: path.to_owned(),
            message: message.to_string(),
            allow_empty,
        });
        Self::check(&state, "commit")?;
        let id = format!("{:040x}", state.next_commit);
        state.next_commit += 1;
        let repo = state.repos.entry(path.to_owned()).or_default();
        if repo.staged == 0 && !allow_empty {
            return Err(VcsError::CommandFailed("nothing to commit".to_string()));
        }
        repo.staged = 0;
        repo.commits.push(CommitInfo {
            id: id.clone(),
            subject: message.lines().next().unwrap_or_default().to_string(),
        });
        Ok(id)
    }

    async fn head(&self, path: &Path) -> Result<Option<String>, VcsError> {
        let state = self.inner.lock();
        Self::check(&state, "head")?;
        Ok(state
            .repos
            .get(path)
            .and_then(|r| r.commits.last())
            .map(|c| c.id.clone()))
    }

    async fn tag(&self, path: &Path, name: &str, commit: &str) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::Tag {
            path: path.to_owned(),
            name: name.to_string(),
            commit: commit.to_string(),
        });
        Self::check(&state, "tag")?;
        state
            .repos
            .entry(path.to_owned())
            .or_default()
            .tags
            .insert(name.to_string(), commit.to_string());
        Ok(())
    }

    async fn delete_tag(&self, path: &Path, name: &str) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        state.calls.push(VcsCall::DeleteTag {
            path: path.to_owned(),
            name: name.to_string(),
        });
        Self::check(&state, "delete_tag")?;
        if let Some(repo) = state.repos.get_mut(path) {
            repo.tags.remove(name);
        }
        Ok(())
    }

    async fn list_tags(
        &self,
        path: &Path,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, VcsError> {
        let state = self.inner.lock();
        Self::check(&state, "list_tags")?;
        Ok(state
            .repos
            .get(path)
            .map(|r| {
                r.tags
                    .iter()
                    .filter(|(tag, _)| tag.starts_with(prefix))
                    .map(|(tag, id)| (tag.clone(), id.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit_exists(&self, path: &Path, commit: &str) -> Result<bool, VcsError> {
        let state = self.inner.lock();
        Self::check(&state, "commit_exists")?;
        Ok(state
            .repos
            .get(path)
            .is_some_and(|r| r.commits.iter().any(|c| c.id == commit)))
    }

    async fn recent_commits(&self, path: &Path, limit: usize) -> Result<Vec<CommitInfo>, VcsError> {
        let state = self.inner.lock();
        Self::check(&state, "recent_commits")?;
        Ok(state
            .repos
            .get(path)
            .map(|r| r.commits.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
