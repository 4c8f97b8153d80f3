// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit events recorded by the daemon.

use crate::id::RunId;
use crate::job::JobName;
use crate::run::RunOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something that happened to a job.
///
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- run --
    #[serde(rename = "run:started")]
    RunStarted {
        job: JobName,
        run_id: RunId,
        attempt: u32,
        due_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        catch_up: bool,
    },

    #[serde(rename = "run:finished")]
    RunFinished {
        job: JobName,
        run_id: RunId,
        attempt: u32,
        outcome: RunOutcome,
        duration_ms: u64,
    },

    #[serde(rename = "run:queued")]
    RunQueued { job: JobName, due_at: DateTime<Utc> },

    // -- tick --
    #[serde(rename = "tick:skipped")]
    TickSkipped { job: JobName, due_at: DateTime<Utc> },

    #[serde(rename = "tick:coalesced")]
    TickCoalesced { job: JobName, due_at: DateTime<Utc> },

    // -- snapshot --
    #[serde(rename = "snapshot:created")]
    SnapshotCreated {
        job: JobName,
        run_id: RunId,
        seq: u64,
        artifact: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        unchanged: bool,
    },

    #[serde(rename = "snapshot:failed")]
    SnapshotFailed {
        job: JobName,
        run_id: RunId,
        error: String,
    },

    // -- prune --
    #[serde(rename = "prune:deleted")]
    GenerationsPruned { job: JobName, seqs: Vec<u64> },

    #[serde(rename = "prune:failed")]
    PruneFailed {
        job: JobName,
        seq: u64,
        error: String,
    },

    // -- recovery --
    #[serde(rename = "recovery:adopted")]
    GenerationAdopted { job: JobName, seq: u64 },

    #[serde(rename = "recovery:discarded")]
    GenerationDiscarded { job: JobName, seq: u64, reason: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RunStarted { .. } => "run:started",
            Event::RunFinished { .. } => "run:finished",
            Event::RunQueued { .. } => "run:queued",
            Event::TickSkipped { .. } => "tick:skipped",
            Event::TickCoalesced { .. } => "tick:coalesced",
            Event::SnapshotCreated { .. } => "snapshot:created",
            Event::SnapshotFailed { .. } => "snapshot:failed",
            Event::GenerationsPruned { .. } => "prune:deleted",
            Event::PruneFailed { .. } => "prune:failed",
            Event::GenerationAdopted { .. } => "recovery:adopted",
            Event::GenerationDiscarded { .. } => "recovery:discarded",
        }
    }

    pub fn job(&self) -> &JobName {
        match self {
            Event::RunStarted { job, .. }
            | Event::RunFinished { job, .. }
            | Event::RunQueued { job, .. }
            | Event::TickSkipped { job, .. }
            | Event::TickCoalesced { job, .. }
            | Event::SnapshotCreated { job, .. }
            | Event::SnapshotFailed { job, .. }
            | Event::GenerationsPruned { job, .. }
            | Event::PruneFailed { job, .. }
            | Event::GenerationAdopted { job, .. }
            | Event::GenerationDiscarded { job, .. } => job,
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::RunStarted {
                job,
                run_id,
                attempt,
                catch_up,
                ..
            } => {
                if *catch_up {
                    format!("{t} job={job} run={run_id} attempt={attempt} catch_up")
                } else {
                    format!("{t} job={job} run={run_id} attempt={attempt}")
                }
            }
            Event::RunFinished {
                job,
                run_id,
                outcome,
                duration_ms,
                ..
            } => format!("{t} job={job} run={run_id} outcome={outcome} ms={duration_ms}"),
            Event::RunQueued { job, .. }
            | Event::TickSkipped { job, .. }
            | Event::TickCoalesced { job, .. } => format!("{t} job={job}"),
            Event::SnapshotCreated { job, seq, artifact, .. } => {
                format!("{t} job={job} seq={seq} {artifact}")
            }
            Event::SnapshotFailed { job, run_id, error } => {
                format!("{t} job={job} run={run_id} error={error}")
            }
            Event::GenerationsPruned { job, seqs } => format!("{t} job={job} seqs={seqs:?}"),
            Event::PruneFailed { job, seq, .. }
            | Event::GenerationAdopted { job, seq }
            | Event::GenerationDiscarded { job, seq, .. } => format!("{t} job={job} seq={seq}"),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
