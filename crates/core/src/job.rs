// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions.

use crate::retention::RetentionPolicy;
use crate::schedule::Schedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

crate::define_id! {
    /// Unique, slug-shaped name of a configured job.
    ///
    /// Used as the key in the generation registry, in archive file names and
    /// in git tag names, so it never contains `/` or whitespace.
    pub struct JobName;
}

/// What happens to a due tick while the job's previous run is still active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Start another run alongside the active one.
    Overlap,
    /// Drop the tick.
    #[default]
    Skip,
    /// Keep at most one pending invocation; further ticks coalesce into it.
    Queue,
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyPolicy::Overlap => write!(f, "overlap"),
            ConcurrencyPolicy::Skip => write!(f, "skip"),
            ConcurrencyPolicy::Queue => write!(f, "queue"),
        }
    }
}

/// How a successful run's output directory is preserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    None,
    #[default]
    Archive,
    Git,
}

impl fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotMode::None => write!(f, "none"),
            SnapshotMode::Archive => write!(f, "archive"),
            SnapshotMode::Git => write!(f, "git"),
        }
    }
}

/// The command a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobCommand {
    /// Passed to `sh -c`.
    Shell(String),
    /// Executed directly, first element is the program.
    Argv(Vec<String>),
}

impl JobCommand {
    /// Program and arguments to spawn.
    pub fn program_and_args(&self) -> Option<(&str, Vec<&str>)> {
        match self {
            JobCommand::Shell(cmd) => Some(("sh", vec!["-c", cmd.as_str()])),
            JobCommand::Argv(argv) => {
                let (program, rest) = argv.split_first()?;
                Some((program.as_str(), rest.iter().map(String::as_str).collect()))
            }
        }
    }
}

impl fmt::Display for JobCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobCommand::Shell(cmd) => f.write_str(cmd),
            JobCommand::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// Re-run policy for failed attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first failure.
    pub max: u32,
    /// Base delay, doubled per attempt.
    pub delay: Duration,
    /// Upper bound of random delay added to each retry.
    pub jitter: Duration,
}

/// A configured job. Immutable once built; reload replaces it as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: JobName,
    pub schedule: Schedule,
    pub command: JobCommand,
    pub working_dir: PathBuf,
    /// Directory captured by snapshots. Required unless snapshots are disabled.
    pub output_dir: Option<PathBuf>,
    /// Where archive generations are written (defaults under the state dir).
    pub archive_dir: Option<PathBuf>,
    pub retention: RetentionPolicy,
    pub concurrency: ConcurrencyPolicy,
    pub timeout: Option<Duration>,
    pub snapshot: SnapshotMode,
    pub retry: RetryConfig,
    /// Random delay before each run starts.
    pub jitter: Option<Duration>,
    pub enabled: bool,
    pub env: BTreeMap<String, String>,
}

impl Job {
    /// Builder with defaults: skip concurrency, archive snapshots, keep everything.
    pub fn builder(
        name: impl Into<JobName>,
        schedule: Schedule,
        command: impl Into<String>,
    ) -> JobBuilder {
        JobBuilder {
            job: Job {
                name: name.into(),
                schedule,
                command: JobCommand::Shell(command.into()),
                working_dir: PathBuf::from("."),
                output_dir: None,
                archive_dir: None,
                retention: RetentionPolicy::default(),
                concurrency: ConcurrencyPolicy::default(),
                timeout: None,
                snapshot: SnapshotMode::default(),
                retry: RetryConfig::default(),
                jitter: None,
                enabled: true,
                env: BTreeMap::new(),
            },
        }
    }

    /// Output directory when this job takes snapshots.
    pub fn snapshot_source(&self) -> Option<&Path> {
        match self.snapshot {
            SnapshotMode::None => None,
            SnapshotMode::Archive | SnapshotMode::Git => self.output_dir.as_deref(),
        }
    }
}

/// Builder for [`Job`].
#[derive(Debug, Clone)]
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn command(mut self, command: JobCommand) -> Self {
        self.job.command = command;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job.working_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job.output_dir = Some(dir.into());
        self
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job.archive_dir = Some(dir.into());
        self
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.job.retention = retention;
        self
    }

    pub fn concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.job.concurrency = policy;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.job.timeout = Some(timeout);
        self
    }

    pub fn snapshot(mut self, mode: SnapshotMode) -> Self {
        self.job.snapshot = mode;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.job.retry = retry;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.job.jitter = Some(jitter);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.job.enabled = enabled;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.job.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// Whether `name` is usable as a job name: `[A-Za-z0-9_-]+`, not starting with `-`.
pub fn is_valid_job_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
