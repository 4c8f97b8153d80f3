// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generation registry: per-job generation records and scheduling state.
//!
//! Persisted as `registry.json`, rewritten atomically on every update. An
//! update that fails to persist leaves the in-memory state untouched, so
//! memory never runs ahead of disk.

use crate::state_file::{rotate_bak_path, write_atomic, FsStateWriter, StateWriter};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rollcron_core::{Generation, JobName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Current on-disk format version.
pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported registry version {found} (expected {REGISTRY_VERSION})")]
    Version { found: u32 },
}

fn first_seq() -> u64 {
    1
}

/// Everything recorded about one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHistory {
    /// Next sequence number to hand out. Never decreases.
    #[serde(default = "first_seq")]
    pub next_seq: u64,
    /// Recorded generations, ascending by seq.
    #[serde(default)]
    pub generations: Vec<Generation>,
    /// Last due time dispatched by the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_due: Option<DateTime<Utc>>,
    /// A previous prune left expired generations behind.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prune_pending: bool,
}

impl Default for JobHistory {
    fn default() -> Self {
        Self {
            next_seq: first_seq(),
            generations: Vec::new(),
            last_due: None,
            prune_pending: false,
        }
    }
}

impl JobHistory {
    /// Record a generation, keeping ascending order and `next_seq` ahead of it.
    pub fn record(&mut self, generation: Generation) {
        self.next_seq = self.next_seq.max(generation.seq + 1);
        let pos = self
            .generations
            .partition_point(|g| g.seq < generation.seq);
        if self.generations.get(pos).is_some_and(|g| g.seq == generation.seq) {
            self.generations[pos] = generation;
        } else {
            self.generations.insert(pos, generation);
        }
    }

    pub fn remove(&mut self, seq: u64) -> Option<Generation> {
        let pos = self.generations.iter().position(|g| g.seq == seq)?;
        Some(self.generations.remove(pos))
    }

    pub fn get(&self, seq: u64) -> Option<&Generation> {
        self.generations.iter().find(|g| g.seq == seq)
    }

    pub fn latest(&self) -> Option<&Generation> {
        self.generations.last()
    }
}

/// The full persisted registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub version: u32,
    #[serde(default)]
    pub jobs: BTreeMap<JobName, JobHistory>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            jobs: BTreeMap::new(),
        }
    }
}

impl Registry {
    pub fn job(&self, name: &JobName) -> Option<&JobHistory> {
        self.jobs.get(name)
    }

    /// History for `name`, created on first use.
    pub fn job_mut(&mut self, name: &JobName) -> &mut JobHistory {
        self.jobs.entry(name.clone()).or_default()
    }

    pub fn generations(&self, name: &JobName) -> &[Generation] {
        self.jobs
            .get(name)
            .map(|h| h.generations.as_slice())
            .unwrap_or_default()
    }

    pub fn last_due(&self, name: &JobName) -> Option<DateTime<Utc>> {
        self.jobs.get(name).and_then(|h| h.last_due)
    }
}

/// Owner of the registry file and its in-memory copy.
pub struct RegistryStore<W: StateWriter = FsStateWriter> {
    path: PathBuf,
    writer: W,
    state: Mutex<Registry>,
}

impl RegistryStore<FsStateWriter> {
    /// Open the registry at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        Self::with_writer(FsStateWriter, path)
    }
}

impl<W: StateWriter> RegistryStore<W> {
    /// Open with a custom writer (for fault injection in tests).
    pub fn with_writer(writer: W, path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let state = load(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            writer,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Registry {
        self.state.lock().clone()
    }

    /// Read without copying the whole registry.
    pub fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        f(&self.state.lock())
    }

    /// Apply `f` to a copy of the registry, persist it, then commit it.
    ///
    /// If persisting fails the in-memory registry is left as it was and the
    /// error is returned.
    pub fn update<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> Result<T, RegistryError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let out = f(&mut next);
        if next == *state {
            return Ok(out);
        }

        let bytes = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.writer, &self.path, &bytes)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "registry saved");

        *state = next;
        Ok(out)
    }
}

/// Load the registry file.
///
/// Returns `Ok(None)` if the file doesn't exist or is corrupt. Corrupt files
/// are moved to a `.bak` file; recovery re-adopts artifacts still on disk.
pub fn load(path: &Path) -> Result<Option<Registry>, RegistryError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice::<Registry>(&bytes) {
        Ok(registry) if registry.version > REGISTRY_VERSION => Err(RegistryError::Version {
            found: registry.version,
        }),
        Ok(registry) => Ok(Some(registry)),
        Err(e) => {
            let bak_path = rotate_bak_path(path);
            warn!(
                error = %e,
                path = %path.display(),
                bak = %bak_path.display(),
                "Corrupt registry, moving to .bak and starting fresh",
            );
            fs::rename(path, &bak_path)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
