// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake archive adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ArchiveAdapter, ArchiveError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Contents written by the fake; `verify` checks for this prefix.
const FAKE_MAGIC: &str = "fake-archive:";

/// Recorded archive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveCall {
    Create { source: PathBuf, dest: PathBuf },
    Verify { path: PathBuf },
    Delete { path: PathBuf },
}

#[derive(Default)]
struct FakeArchiveState {
    calls: Vec<ArchiveCall>,
    fail_ops: HashSet<&'static str>,
}

/// Writes small marker files instead of real archives.
///
/// The files are real so that rename, recovery and deletion can be observed
/// on disk; their content is just a marker naming the source directory.
#[derive(Clone, Default)]
pub struct FakeArchiveAdapter {
    inner: Arc<Mutex<FakeArchiveState>>,
}

impl FakeArchiveAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ArchiveCall> {
        self.inner.lock().calls.clone()
    }

    /// Make `op` (`"create"`, `"verify"`, `"delete"`) fail until cleared.
    pub fn fail(&self, op: &'static str) {
        self.inner.lock().fail_ops.insert(op);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().fail_ops.clear();
    }

    /// Write a file that passes `verify`, as if left behind by a crash.
    pub fn write_valid(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("{FAKE_MAGIC}recovered"))
    }

    fn record(&self, call: ArchiveCall, op: &'static str) -> Result<(), ArchiveError> {
        let mut state = self.inner.lock();
        state.calls.push(call);
        if state.fail_ops.contains(op) {
            return Err(ArchiveError::CommandFailed(format!("injected {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ArchiveAdapter for FakeArchiveAdapter {
    async fn create(&self, source: &Path, dest: &Path) -> Result<u64, ArchiveError> {
        self.record(
            ArchiveCall::Create {
                source: source.to_owned(),
                dest: dest.to_owned(),
            },
            "create",
        )?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = format!("{FAKE_MAGIC}{}", source.display());
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }

    async fn verify(&self, path: &Path) -> Result<(), ArchiveError> {
        self.record(
            ArchiveCall::Verify {
                path: path.to_owned(),
            },
            "verify",
        )?;
        let body = std::fs::read_to_string(path).unwrap_or_default();
        if body.starts_with(FAKE_MAGIC) {
            Ok(())
        } else {
            Err(ArchiveError::Corrupt {
                path: path.display().to_string(),
                reason: "missing marker".to_string(),
            })
        }
    }

    async fn delete(&self, path: &Path) -> Result<(), ArchiveError> {
        self.record(
            ArchiveCall::Delete {
                path: path.to_owned(),
            },
            "delete",
        )?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
