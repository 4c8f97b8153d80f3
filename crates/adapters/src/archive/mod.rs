// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive adapters

mod tar;

pub use self::tar::TarZstdArchiver;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ArchiveCall, FakeArchiveAdapter};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("corrupt archive {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Adapter that packs a directory into a single compressed file
#[async_trait]
pub trait ArchiveAdapter: Clone + Send + Sync + 'static {
    /// Pack `source` into a new file at `dest`, fsynced. Returns its size in bytes.
    async fn create(&self, source: &Path, dest: &Path) -> Result<u64, ArchiveError>;

    /// Check that `path` decompresses and lists cleanly.
    async fn verify(&self, path: &Path) -> Result<(), ArchiveError>;

    /// Remove `path`. Removing a missing file succeeds.
    async fn delete(&self, path: &Path) -> Result<(), ArchiveError>;
}
