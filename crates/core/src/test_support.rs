// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Artifact, Generation, Job, JobName, RunId, Schedule};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

// ── Job builders ────────────────────────────────────────────────────────────

/// A job on a `secs`-second interval running `command`.
pub fn interval_job(name: &str, secs: u64, command: &str) -> Job {
    let schedule = Schedule::Interval {
        every: Duration::from_secs(secs.max(1)),
        anchor: DateTime::UNIX_EPOCH,
    };
    Job::builder(name, schedule, command).build()
}

// ── Generation factory functions ────────────────────────────────────────────

pub fn archive_generation(job: &str, seq: u64, dir: &Path, created_at: DateTime<Utc>) -> Generation {
    let job = JobName::new(job);
    Generation {
        seq,
        artifact: Artifact::Archive {
            path: dir.join(crate::archive_file_name(&job, seq)),
        },
        job,
        run_id: Some(RunId::new(format!("run-{seq}"))),
        created_at,
        unchanged: false,
    }
}

pub fn commit_generation(job: &str, seq: u64, commit: &str, created_at: DateTime<Utc>) -> Generation {
    let job = JobName::new(job);
    Generation {
        seq,
        artifact: Artifact::Commit {
            id: commit.to_string(),
            tag: Some(crate::generation_tag(&job, seq)),
        },
        job,
        run_id: Some(RunId::new(format!("run-{seq}"))),
        created_at,
        unchanged: false,
    }
}
