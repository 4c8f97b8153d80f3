// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick handling and concurrency policy

use super::Runtime;
use chrono::{DateTime, Utc};
use rollcron_adapters::{ArchiveAdapter, VcsAdapter};
use rollcron_core::{Clock, ConcurrencyPolicy, DueTime, Event, IdGen, Job, JobName};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// What a due tick turns into given the job's active runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Start,
    Skip,
    Queue,
    Coalesce,
}

impl<V, A, C, G> Runtime<V, A, C, G>
where
    V: VcsAdapter,
    A: ArchiveAdapter,
    C: Clock,
    G: IdGen,
{
    /// Dispatch every job due at or before `now` and queue its next due time.
    ///
    /// Returns the jobs that fired.
    pub fn tick(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<JobName> {
        let fired = self.queue.lock().fired(now);
        let mut names = Vec::with_capacity(fired.len());

        for (name, due) in fired {
            let Some(job) = self.jobs.get(&name) else {
                continue;
            };
            if !job.enabled {
                continue;
            }

            self.dispatch(&job, due);
            self.record_last_due(&job, due);

            // Next due time comes from the schedule, not from run completion.
            match job.schedule.next_due(due.at.max(now)) {
                Some(next) => self.queue.lock().set(name.clone(), DueTime::regular(next)),
                None => tracing::warn!(job = %name, "schedule has no future due time"),
            }
            names.push(name);
        }
        names
    }

    fn dispatch(self: &Arc<Self>, job: &Arc<Job>, due: DueTime) {
        let action = {
            let mut states = self.states.lock();
            let state = states.entry(job.name.clone()).or_default();
            match (state.active, job.concurrency) {
                (0, _) | (_, ConcurrencyPolicy::Overlap) => {
                    state.active += 1;
                    Dispatch::Start
                }
                (_, ConcurrencyPolicy::Skip) => Dispatch::Skip,
                (_, ConcurrencyPolicy::Queue) => {
                    if state.pending.is_some() {
                        Dispatch::Coalesce
                    } else {
                        state.pending = Some(due);
                        Dispatch::Queue
                    }
                }
            }
        };

        let job_name = job.name.clone();
        match action {
            Dispatch::Start => self.spawn_run(Arc::clone(job), due),
            Dispatch::Skip => {
                tracing::info!(job = %job_name, due_at = %due.at, "previous run still active, skipping tick");
                self.run_logger
                    .append(&job_name, due.at, "tick", "skipped: previous run still active");
                self.emit(Event::TickSkipped {
                    job: job_name,
                    due_at: due.at,
                });
            }
            Dispatch::Queue => {
                tracing::info!(job = %job_name, due_at = %due.at, "previous run still active, queueing");
                self.emit(Event::RunQueued {
                    job: job_name,
                    due_at: due.at,
                });
            }
            Dispatch::Coalesce => {
                tracing::info!(job = %job_name, due_at = %due.at, "run already queued, coalescing tick");
                self.emit(Event::TickCoalesced {
                    job: job_name,
                    due_at: due.at,
                });
            }
        }
    }

    fn record_last_due(&self, job: &Job, due: DueTime) {
        if let Err(e) = self
            .registry
            .update(|r| r.job_mut(&job.name).last_due = Some(due.at))
        {
            tracing::error!(job = %job.name, error = %e, "failed to persist last due time");
        }
    }

    /// Start a run task. The caller has already counted it in `active`.
    pub(crate) fn spawn_run(self: &Arc<Self>, job: Arc<Job>, due: DueTime) {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            let name = job.name.clone();
            runtime.execute(job, due, false).await;
            runtime.finish(&name);
        });
    }

    /// Bookkeeping after a run task ends: start the queued invocation, if
    /// any, and wake idle waiters.
    pub(crate) fn finish(self: &Arc<Self>, name: &JobName) {
        let queued = {
            let mut states = self.states.lock();
            let state = states.entry(name.clone()).or_default();
            state.active = state.active.saturating_sub(1);
            let cancelled = *self.cancel.borrow();
            if state.active > 0 {
                None
            } else {
                match (state.pending.take(), self.jobs.get(name)) {
                    (Some(due), Some(job)) if job.enabled && !cancelled => {
                        state.active += 1;
                        Some((job, due))
                    }
                    _ => None,
                }
            }
        };

        if let Some((job, due)) = queued {
            tracing::info!(job = %job.name, "starting queued run");
            self.spawn_run(job, due);
        }

        if self.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
        self.wake.notify_one();
    }
}
