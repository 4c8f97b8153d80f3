// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generation records: immutable snapshot artifacts.

use crate::id::RunId;
use crate::job::JobName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The artifact a generation points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// A git commit, addressed by a tag so pruning can drop the reference.
    Commit {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    /// A compressed tarball.
    Archive { path: PathBuf },
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Commit { id, .. } => {
                write!(f, "commit {}", id.chars().take(12).collect::<String>())
            }
            Artifact::Archive { path } => write!(f, "archive {}", path.display()),
        }
    }
}

/// One immutable, sequence-numbered snapshot of a job's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Per-job, strictly increasing, never reused.
    pub seq: u64,
    pub job: JobName,
    /// Run that produced it; `None` for generations adopted at recovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub created_at: DateTime<Utc>,
    pub artifact: Artifact,
    /// Git no-op snapshot referencing the previous commit.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unchanged: bool,
}

impl Generation {
    pub fn archive_path(&self) -> Option<&PathBuf> {
        match &self.artifact {
            Artifact::Archive { path } => Some(path),
            Artifact::Commit { .. } => None,
        }
    }

    pub fn commit_id(&self) -> Option<&str> {
        match &self.artifact {
            Artifact::Commit { id, .. } => Some(id),
            Artifact::Archive { .. } => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.artifact {
            Artifact::Commit { tag, .. } => tag.as_deref(),
            Artifact::Archive { .. } => None,
        }
    }
}

/// Archive file name for a job generation: `<job>-<seq:06>.tar.zst`.
pub fn archive_file_name(job: &JobName, seq: u64) -> String {
    format!("{}-{:06}.tar.zst", job, seq)
}

/// Parse the sequence number back out of an archive file name for `job`.
pub fn parse_archive_file_name(job: &JobName, file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(job.as_str())?.strip_prefix('-')?;
    let digits = rest.strip_suffix(".tar.zst")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Git tag for a job generation: `rollcron/<job>/<seq>`.
pub fn generation_tag(job: &JobName, seq: u64) -> String {
    format!("rollcron/{}/{}", job, seq)
}

#[cfg(test)]
#[path = "generation_tests.rs"]
mod tests;
