// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention pruning

use crate::error::PersistenceError;
use crate::snapshot::SnapshotEngine;
use chrono::{DateTime, Utc};
use rollcron_adapters::{ArchiveAdapter, VcsAdapter};
use rollcron_core::Job;

/// Outcome of one prune pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Generations whose artifacts were deleted and records removed.
    pub deleted: Vec<u64>,
    /// Generations that could not be deleted; they stay recorded.
    pub failed: Vec<(u64, String)>,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }
}

/// Delete every generation of `job` outside its retention policy.
///
/// Individual delete failures are reported, not returned: the generation
/// stays recorded and the job is flagged `prune_pending` so the next cycle
/// retries. Only a failure to persist the registry is an error.
pub async fn prune<V, A>(
    snapshots: &SnapshotEngine<V, A>,
    job: &Job,
    now: DateTime<Utc>,
) -> Result<PruneReport, PersistenceError>
where
    V: VcsAdapter,
    A: ArchiveAdapter,
{
    let registry = snapshots.registry();
    let generations = registry.read(|r| r.generations(&job.name).to_vec());
    let plan = job.retention.evaluate(&generations, now);

    let mut report = PruneReport::default();
    for generation in &plan.expire {
        match snapshots.delete(job, generation).await {
            Ok(()) => report.deleted.push(generation.seq),
            Err(e) => {
                tracing::warn!(
                    job = %job.name,
                    seq = generation.seq,
                    error = %e,
                    "failed to delete generation"
                );
                report.failed.push((generation.seq, e.to_string()));
            }
        }
    }

    let pending = !report.failed.is_empty();
    let has_history = registry.read(|r| r.job(&job.name).is_some());
    if has_history {
        registry.update(|r| {
            let history = r.job_mut(&job.name);
            for seq in &report.deleted {
                history.remove(*seq);
            }
            history.prune_pending = pending;
        })?;
    }

    if !report.deleted.is_empty() {
        tracing::info!(job = %job.name, seqs = ?report.deleted, "pruned generations");
    }
    Ok(report)
}

#[cfg(test)]
#[path = "pruner_tests.rs"]
mod tests;
