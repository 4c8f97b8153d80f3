// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::archive::{ArchiveAdapter, ArchiveError};
use crate::vcs::{CommitInfo, VcsAdapter, VcsError};
use async_trait::async_trait;
use std::path::Path;
use tracing::Instrument;

/// Wrapper that adds tracing to any VcsAdapter
#[derive(Clone)]
pub struct TracedVcs<V> {
    inner: V,
}

impl<V> TracedVcs<V> {
    pub fn new(inner: V) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<V: VcsAdapter> VcsAdapter for TracedVcs<V> {
    async fn ensure_repo(&self, path: &Path) -> Result<(), VcsError> {
        let result = self.inner.ensure_repo(path).await;
        if let Err(ref e) = result {
            tracing::error!(path = %path.display(), error = %e, "ensure_repo failed");
        }
        result
    }

    async fn stage_all(&self, path: &Path) -> Result<usize, VcsError> {
        async {
            let start = std::time::Instant::now();
            let result = self.inner.stage_all(path).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(changed) => tracing::debug!(changed, elapsed_ms, "staged"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "stage failed"),
            }
            result
        }
        .instrument(tracing::info_span!("vcs.stage", path = %path.display()))
        .await
    }

    async fn commit(
        &self,
        path: &Path,
        message: &str,
        allow_empty: bool,
    ) -> Result<String, VcsError> {
        async {
            tracing::info!(allow_empty, "starting");
            let start = std::time::Instant::now();
            let result = self.inner.commit(path, message, allow_empty).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(id) => tracing::info!(commit = id.as_str(), elapsed_ms, "committed"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "commit failed"),
            }
            result
        }
        .instrument(tracing::info_span!("vcs.commit", path = %path.display()))
        .await
    }

    async fn head(&self, path: &Path) -> Result<Option<String>, VcsError> {
        let result = self.inner.head(path).await;
        tracing::trace!(path = %path.display(), head = ?result.as_ref().ok(), "resolved head");
        result
    }

    async fn tag(&self, path: &Path, name: &str, commit: &str) -> Result<(), VcsError> {
        let result = self.inner.tag(path, name, commit).await;
        tracing::info_span!("vcs.tag", name, commit).in_scope(|| match &result {
            Ok(()) => tracing::debug!("tagged"),
            Err(e) => tracing::error!(error = %e, "tag failed"),
        });
        result
    }

    async fn delete_tag(&self, path: &Path, name: &str) -> Result<(), VcsError> {
        let result = self.inner.delete_tag(path, name).await;
        tracing::info_span!("vcs.delete_tag", name).in_scope(|| match &result {
            Ok(()) => tracing::info!("tag deleted"),
            Err(e) => tracing::warn!(error = %e, "delete_tag failed"),
        });
        result
    }

    async fn list_tags(
        &self,
        path: &Path,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, VcsError> {
        self.inner.list_tags(path, prefix).await
    }

    async fn commit_exists(&self, path: &Path, commit: &str) -> Result<bool, VcsError> {
        self.inner.commit_exists(path, commit).await
    }

    async fn recent_commits(&self, path: &Path, limit: usize) -> Result<Vec<CommitInfo>, VcsError> {
        self.inner.recent_commits(path, limit).await
    }
}

/// Wrapper that adds tracing to any ArchiveAdapter
#[derive(Clone)]
pub struct TracedArchive<A> {
    inner: A,
}

impl<A> TracedArchive<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<A: ArchiveAdapter> ArchiveAdapter for TracedArchive<A> {
    async fn create(&self, source: &Path, dest: &Path) -> Result<u64, ArchiveError> {
        async {
            tracing::info!("starting");
            let start = std::time::Instant::now();
            let result = self.inner.create(source, dest).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(bytes) => tracing::info!(bytes, elapsed_ms, "archive written"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "create failed"),
            }
            result
        }
        .instrument(tracing::info_span!(
            "archive.create",
            source = %source.display(),
            dest = %dest.display()
        ))
        .await
    }

    async fn verify(&self, path: &Path) -> Result<(), ArchiveError> {
        async {
            let start = std::time::Instant::now();
            let result = self.inner.verify(path).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "verified"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "verify failed"),
            }
            result
        }
        .instrument(tracing::info_span!("archive.verify", path = %path.display()))
        .await
    }

    async fn delete(&self, path: &Path) -> Result<(), ArchiveError> {
        let result = self.inner.delete(path).await;
        tracing::info_span!("archive.delete", path = %path.display()).in_scope(|| match &result {
            Ok(()) => tracing::info!("deleted"),
            Err(e) => tracing::warn!(error = %e, "delete failed"),
        });
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
