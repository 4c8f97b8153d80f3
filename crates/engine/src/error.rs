// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use rollcron_adapters::{ArchiveError, VcsError};
use rollcron_core::JobName;
use rollcron_storage::RegistryError;
use thiserror::Error;

/// A registry update could not be persisted; the in-memory state was kept as it was.
#[derive(Debug, Error)]
#[error("registry update failed: {0}")]
pub struct PersistenceError(#[from] pub RegistryError);

/// Snapshot creation or verification failed. The run is still recorded;
/// the next successful run tries again.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("job {0} has no output directory")]
    NoOutputDir(JobName),
    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl SnapshotError {
    /// Short kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SnapshotError::NoOutputDir(_) => "config",
            SnapshotError::Vcs(_) => "vcs",
            SnapshotError::Archive(_) => "archive",
            SnapshotError::Io(_) => "io",
            SnapshotError::Persistence(_) => "persistence",
        }
    }
}

impl From<RegistryError> for SnapshotError {
    fn from(e: RegistryError) -> Self {
        SnapshotError::Persistence(PersistenceError(e))
    }
}

/// Deleting one expired generation failed. Non-fatal; retried next cycle.
#[derive(Debug, Error)]
pub enum PruneError {
    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// Errors surfaced by the runtime's public operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("audit log error: {0}")]
    Audit(#[from] rollcron_storage::AuditError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RegistryError> for EngineError {
    fn from(e: RegistryError) -> Self {
        EngineError::Persistence(PersistenceError(e))
    }
}
