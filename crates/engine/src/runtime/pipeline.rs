// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run pipeline: execute with retries, then snapshot and prune.

use super::Runtime;
use crate::backoff;
use crate::error::EngineError;
use crate::executor::cancelled;
use crate::pruner;
use chrono::{DateTime, Utc};
use rollcron_adapters::{ArchiveAdapter, VcsAdapter};
use rollcron_core::{Clock, DueTime, Event, IdGen, Job, JobName, Run, RunOutcome};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

impl<V, A, C, G> Runtime<V, A, C, G>
where
    V: VcsAdapter,
    A: ArchiveAdapter,
    C: Clock,
    G: IdGen,
{
    /// Run `job` once, right now, outside its schedule.
    ///
    /// Goes through the same pipeline as a scheduled run (retries,
    /// snapshot, prune) but skips start jitter. Returns `None` if the
    /// runtime was shut down before the run started.
    pub async fn run_job_now(self: &Arc<Self>, name: &str) -> Result<Option<Run>, EngineError> {
        let job = self
            .jobs
            .get(&JobName::new(name))
            .ok_or_else(|| EngineError::JobNotFound(name.to_string()))?;

        self.states.lock().entry(job.name.clone()).or_default().active += 1;
        self.inflight.fetch_add(1, Ordering::SeqCst);

        let due = DueTime::regular(self.clock.utc_now());
        let run = self.execute(Arc::clone(&job), due, true).await;
        self.finish(&job.name);
        Ok(run)
    }

    /// Execute attempts until one succeeds or retries run out, then
    /// snapshot and prune on success.
    pub(crate) async fn execute(
        self: &Arc<Self>,
        job: Arc<Job>,
        due: DueTime,
        manual: bool,
    ) -> Option<Run> {
        let mut cancel = self.cancel.subscribe();

        if !manual {
            if let Some(max) = job.jitter {
                let delay = backoff::random_jitter(max);
                tracing::debug!(job = %job.name, delay_ms = delay.as_millis() as u64, "start jitter");
                if sleep_or_cancel(delay, &mut cancel).await {
                    return None;
                }
            }
        }

        let mut attempt = 1;
        let run = loop {
            let permit = tokio::select! {
                permit = Arc::clone(&self.workers).acquire_owned() => permit.ok(),
                _ = cancelled(&mut cancel) => None,
            };
            let Some(permit) = permit else {
                return None;
            };

            let run = self.attempt(&job, due, attempt, &mut cancel).await;
            drop(permit);

            if run.is_success() || attempt > job.retry.max || *cancel.borrow() {
                break run;
            }
            let delay = backoff::retry_delay(&job.retry, attempt);
            tracing::info!(
                job = %job.name,
                run_id = %run.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying after failure"
            );
            if sleep_or_cancel(delay, &mut cancel).await {
                break run;
            }
            attempt += 1;
        };

        let prune_pending = self
            .registry
            .read(|r| r.job(&job.name).is_some_and(|h| h.prune_pending));
        if run.is_success() || prune_pending {
            let _guard = self.locks.lock(&job.name).await;
            let created = run.is_success() && self.snapshot(&job, &run).await;
            if created || prune_pending {
                self.prune_job(&job).await;
            }
        }
        Some(run)
    }

    async fn attempt(
        &self,
        job: &Job,
        due: DueTime,
        attempt: u32,
        cancel: &mut watch::Receiver<bool>,
    ) -> Run {
        let run_id = self.ids.next();
        tracing::info!(
            job = %job.name,
            run_id = %run_id,
            attempt,
            catch_up = due.catch_up,
            "run started"
        );
        self.emit(Event::RunStarted {
            job: job.name.clone(),
            run_id: run_id.clone(),
            attempt,
            due_at: due.at,
            catch_up: due.catch_up,
        });

        let run = self.executor.run(job, run_id, attempt, cancel).await;

        match &run.outcome {
            RunOutcome::Success => tracing::info!(
                job = %job.name,
                run_id = %run.id,
                attempt,
                duration_ms = run.duration_ms(),
                "run succeeded"
            ),
            RunOutcome::Failure(reason) => tracing::warn!(
                job = %job.name,
                run_id = %run.id,
                attempt,
                kind = reason.kind(),
                error = %reason,
                "run failed"
            ),
        }
        self.run_logger.append_run(&run);
        self.emit(Event::RunFinished {
            job: job.name.clone(),
            run_id: run.id.clone(),
            attempt,
            outcome: run.outcome.clone(),
            duration_ms: run.duration_ms(),
        });
        run
    }

    /// Snapshot a successful run. Caller holds the job lock.
    /// Returns whether a generation was recorded.
    async fn snapshot(&self, job: &Job, run: &Run) -> bool {
        match self.snapshots.create(job, run).await {
            Ok(Some(generation)) => {
                self.emit(Event::SnapshotCreated {
                    job: job.name.clone(),
                    run_id: run.id.clone(),
                    seq: generation.seq,
                    artifact: generation.artifact.to_string(),
                    unchanged: generation.unchanged,
                });
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::error!(
                    job = %job.name,
                    run_id = %run.id,
                    kind = e.kind(),
                    error = %e,
                    "snapshot failed"
                );
                self.emit(Event::SnapshotFailed {
                    job: job.name.clone(),
                    run_id: run.id.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Apply the retention policy. Caller holds the job lock.
    pub(crate) async fn prune_job(&self, job: &Job) {
        let now = self.clock.utc_now();
        match pruner::prune(&self.snapshots, job, now).await {
            Ok(report) => {
                if !report.deleted.is_empty() {
                    self.emit(Event::GenerationsPruned {
                        job: job.name.clone(),
                        seqs: report.deleted,
                    });
                }
                for (seq, error) in report.failed {
                    self.emit(Event::PruneFailed {
                        job: job.name.clone(),
                        seq,
                        error,
                    });
                }
            }
            Err(e) => {
                tracing::error!(job = %job.name, kind = "persistence", error = %e, "prune failed");
            }
        }
    }

    /// Reconcile artifacts with the registry for one job.
    pub(crate) async fn recover_job(&self, job: &Job, now: DateTime<Utc>) {
        let _guard = self.locks.lock(&job.name).await;
        match self.snapshots.recover(job, now).await {
            Ok(report) => {
                if report.temp_removed > 0 {
                    tracing::info!(job = %job.name, count = report.temp_removed, "removed temporary files");
                }
                for seq in report.adopted {
                    self.emit(Event::GenerationAdopted {
                        job: job.name.clone(),
                        seq,
                    });
                }
                for (seq, reason) in report.discarded {
                    self.emit(Event::GenerationDiscarded {
                        job: job.name.clone(),
                        seq,
                        reason,
                    });
                }
            }
            Err(e) => {
                tracing::error!(job = %job.name, kind = e.kind(), error = %e, "recovery failed");
            }
        }
    }
}

/// Sleep for `delay`; returns true if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if delay.is_zero() {
        return *cancel.borrow();
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = cancelled(cancel) => true,
    }
}
