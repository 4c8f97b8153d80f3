// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records: one execution attempt of a job.

use crate::id::RunId;
use crate::job::JobName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker appended to a captured stream that exceeded its buffer.
pub const TRUNCATION_MARKER: &str = "\n[rollcron: output truncated]\n";

/// Why a run did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Exited non-zero, or was killed by a signal (`code` is `None`).
    NonZeroExit { code: Option<i32> },
    /// Exceeded the job timeout and was terminated.
    Timeout { after_ms: u64 },
    /// The command could not be started.
    Spawn { message: String },
}

impl FailureReason {
    /// Short kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::NonZeroExit { .. } => "exit",
            FailureReason::Timeout { .. } => "timeout",
            FailureReason::Spawn { .. } => "spawn",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NonZeroExit { code: Some(code) } => write!(f, "exit code {code}"),
            FailureReason::NonZeroExit { code: None } => write!(f, "killed by signal"),
            FailureReason::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            FailureReason::Spawn { message } => write!(f, "spawn failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure(FailureReason),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "success"),
            RunOutcome::Failure(reason) => write!(f, "failure ({reason})"),
        }
    }
}

/// Bounded capture of a run's stdout and stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Either stream exceeded the bound and carries [`TRUNCATION_MARKER`].
    pub truncated: bool,
}

/// A finished run. Never mutated after completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub job: JobName,
    /// 1 for the first attempt, incremented by retries.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub output: CapturedOutput,
    pub outcome: RunOutcome,
}

impl Run {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
