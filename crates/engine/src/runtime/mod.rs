// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the rollcron engine
//!
//! Owns the due queue, the job set and per-job run state. The scheduler loop
//! calls [`Runtime::tick`]; each dispatched run executes on its own task,
//! bounded by the worker semaphore.

mod dispatch;
mod pipeline;

use crate::error::EngineError;
use crate::executor::{Executor, ExecutorConfig};
use crate::job_locks::JobLocks;
use crate::job_set::{JobSet, JobSetDiff, JobTable};
use crate::log_paths;
use crate::run_logger::RunLogger;
use crate::scheduler::DueQueue;
use crate::snapshot::SnapshotEngine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rollcron_adapters::{ArchiveAdapter, VcsAdapter};
use rollcron_core::{Clock, DueTime, Event, Generation, IdGen, Job, JobName};
use rollcron_storage::{AuditLog, RegistryStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, Semaphore};

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 4;

/// Longest the loop sleeps without re-reading the clock.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// Runtime path and pool configuration
pub struct RuntimeConfig {
    /// Root state directory (e.g. ~/.local/state/rollcron)
    pub state_dir: PathBuf,
    /// Maximum concurrently executing runs
    pub workers: usize,
    pub executor: ExecutorConfig,
}

impl RuntimeConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            workers: DEFAULT_WORKERS,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Runtime adapter dependencies
pub struct RuntimeDeps<V, A, C, G> {
    pub vcs: V,
    pub archive: A,
    pub clock: C,
    pub ids: G,
}

/// Per-job run bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct JobState {
    /// Runs currently executing or waiting for a worker.
    pub(crate) active: usize,
    /// At most one queued invocation (`queue` policy).
    pub(crate) pending: Option<DueTime>,
}

/// Runtime that coordinates scheduling, execution and snapshots
pub struct Runtime<V, A, C: Clock, G> {
    pub(crate) jobs: JobTable,
    pub(crate) queue: Mutex<DueQueue>,
    pub(crate) states: Mutex<HashMap<JobName, JobState>>,
    pub(crate) snapshots: SnapshotEngine<V, A>,
    pub(crate) registry: Arc<RegistryStore>,
    pub(crate) audit: Mutex<AuditLog>,
    pub(crate) executor: Executor<C>,
    pub(crate) run_logger: RunLogger,
    pub(crate) clock: C,
    pub(crate) ids: G,
    pub(crate) locks: JobLocks,
    pub(crate) workers: Arc<Semaphore>,
    pub(crate) inflight: AtomicUsize,
    pub(crate) idle: Notify,
    pub(crate) wake: Notify,
    pub(crate) cancel: watch::Sender<bool>,
}

impl<V, A, C, G> Runtime<V, A, C, G>
where
    V: VcsAdapter,
    A: ArchiveAdapter,
    C: Clock,
    G: IdGen,
{
    /// Open the registry and audit log under the state directory.
    pub fn new(
        deps: RuntimeDeps<V, A, C, G>,
        config: RuntimeConfig,
        jobs: JobSet,
    ) -> Result<Arc<Self>, EngineError> {
        std::fs::create_dir_all(&config.state_dir)?;
        let registry = Arc::new(RegistryStore::open(log_paths::registry_path(
            &config.state_dir,
        ))?);
        let audit = AuditLog::open(&log_paths::audit_path(&config.state_dir))?;
        let snapshots = SnapshotEngine::new(
            deps.vcs,
            deps.archive,
            Arc::clone(&registry),
            log_paths::archives_root(&config.state_dir),
        );
        let (cancel, _) = watch::channel(false);

        Ok(Arc::new(Self {
            jobs: JobTable::new(jobs),
            queue: Mutex::new(DueQueue::new()),
            states: Mutex::new(HashMap::new()),
            snapshots,
            registry,
            audit: Mutex::new(audit),
            executor: Executor::new(deps.clock.clone(), config.executor),
            run_logger: RunLogger::new(log_paths::logs_dir(&config.state_dir)),
            clock: deps.clock,
            ids: deps.ids,
            locks: JobLocks::new(),
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            inflight: AtomicUsize::new(0),
            idle: Notify::new(),
            wake: Notify::new(),
            cancel,
        }))
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn jobs(&self) -> Arc<JobSet> {
        self.jobs.snapshot()
    }

    pub fn registry(&self) -> &Arc<RegistryStore> {
        &self.registry
    }

    /// Recorded generations of `job`, ascending by sequence number.
    pub fn generations(&self, job: &JobName) -> Vec<Generation> {
        self.registry.read(|r| r.generations(job).to_vec())
    }

    /// Due time currently queued for `job`.
    pub fn due(&self, job: &JobName) -> Option<DueTime> {
        self.queue.lock().get(job)
    }

    /// Earliest due time across all jobs.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.queue.lock().next_deadline()
    }

    /// Number of runs executing or waiting for a worker.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    /// Recover and prune every job, then queue initial due times.
    ///
    /// Failures are logged per job; one broken job does not stop the others.
    pub async fn start(self: &Arc<Self>) {
        let now = self.clock.utc_now();
        let jobs = self.jobs.snapshot();
        for job in jobs.iter() {
            self.recover_job(job, now).await;
            {
                let _guard = self.locks.lock(&job.name).await;
                self.prune_job(job).await;
            }
            self.schedule_initial(job, now);
        }
        tracing::info!(jobs = jobs.len(), "runtime started");
    }

    fn schedule_initial(&self, job: &Job, now: DateTime<Utc>) {
        if !job.enabled {
            self.queue.lock().cancel(&job.name);
            tracing::info!(job = %job.name, "job disabled, not scheduling");
            return;
        }
        let last_due = self.registry.read(|r| r.last_due(&job.name));
        match job.schedule.resume_due(last_due, now) {
            Some(due) => {
                if due.catch_up {
                    tracing::info!(
                        job = %job.name,
                        last_due = ?last_due,
                        "missed due times while stopped, scheduling one catch-up run"
                    );
                }
                tracing::debug!(job = %job.name, due_at = %due.at, "scheduled");
                self.queue.lock().set(job.name.clone(), due);
            }
            None => {
                tracing::warn!(job = %job.name, schedule = %job.schedule, "schedule has no future due time");
            }
        }
    }

    /// Swap in a new job set. In-flight runs keep their old definition.
    pub fn reload(self: &Arc<Self>, jobs: JobSet) -> JobSetDiff {
        let diff = self.jobs.replace(jobs);
        let now = self.clock.utc_now();

        for name in &diff.removed {
            self.queue.lock().cancel(name);
            if let Some(state) = self.states.lock().get_mut(name) {
                state.pending = None;
            }
        }
        for name in &diff.added {
            if let Some(job) = self.jobs.get(name) {
                self.schedule_initial(&job, now);
            }
        }
        for name in &diff.rescheduled {
            let Some(job) = self.jobs.get(name) else {
                continue;
            };
            if !job.enabled {
                self.queue.lock().cancel(name);
                continue;
            }
            match job.schedule.first_due(now) {
                Some(at) => self.queue.lock().set(name.clone(), DueTime::regular(at)),
                None => self.queue.lock().cancel(name),
            }
        }

        tracing::info!(
            added = diff.added.len(),
            removed = diff.removed.len(),
            changed = diff.changed.len(),
            "job set reloaded"
        );
        self.wake.notify_one();
        diff
    }

    /// Scheduler loop: tick, then sleep until the next due time, a wake-up
    /// or shutdown.
    pub async fn run_loop(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let now = self.clock.utc_now();
            self.tick(now);

            let sleep_for = self
                .next_deadline()
                .and_then(|at| (at - self.clock.utc_now()).to_std().ok())
                .map_or(MAX_SLEEP, |d| d.min(MAX_SLEEP));

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.wake.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler loop stopped");
    }

    /// Wait until no run is executing or queued for a worker.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inflight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Give in-flight runs `grace` to finish, then terminate them.
    /// Snapshot and prune critical sections are always drained.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!(
            inflight = self.inflight(),
            grace_ms = grace.as_millis() as u64,
            "shutting down"
        );
        if tokio::time::timeout(grace, self.wait_idle()).await.is_err() {
            tracing::warn!(
                inflight = self.inflight(),
                "grace period elapsed, terminating in-flight runs"
            );
        }
        self.cancel.send_replace(true);
        self.wait_idle().await;
        self.workers.close();
        self.locks.drain().await;
        tracing::info!("shutdown complete");
    }

    /// Append to the audit log; failures are logged, never propagated.
    pub(crate) fn emit(&self, event: Event) {
        tracing::debug!(job = %event.job(), "{}", event.log_summary());
        if let Err(e) = self.audit.lock().append(&event, self.clock.utc_now()) {
            tracing::error!(event = event.name(), error = %e, "failed to append audit record");
        }
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
