// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Due-time queue for the scheduler loop

use chrono::{DateTime, Utc};
use rollcron_core::{DueTime, JobName};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Min-heap of jobs keyed by their next due time.
///
/// Each job has at most one live entry. Replacing or cancelling an entry
/// bumps the job's version; stale heap entries are skipped when popped.
#[derive(Debug, Default)]
pub struct DueQueue {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, u64, JobName)>>,
    live: HashMap<JobName, (u64, DueTime)>,
    version: u64,
}

impl DueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the due time for `job`.
    pub fn set(&mut self, job: JobName, due: DueTime) {
        self.version += 1;
        self.heap.push(Reverse((due.at, self.version, job.clone())));
        self.live.insert(job, (self.version, due));
    }

    /// Remove `job`'s entry, if any.
    pub fn cancel(&mut self, job: &JobName) {
        self.live.remove(job);
    }

    pub fn get(&self, job: &JobName) -> Option<DueTime> {
        self.live.get(job).map(|(_, due)| *due)
    }

    /// Remove and return every entry due at or before `now`, earliest first.
    pub fn fired(&mut self, now: DateTime<Utc>) -> Vec<(JobName, DueTime)> {
        let mut fired = Vec::new();
        while let Some(Reverse((at, version, _))) = self.heap.peek() {
            if *at > now {
                break;
            }
            let version = *version;
            let Some(Reverse((_, _, job))) = self.heap.pop() else {
                break;
            };
            if let Some((live_version, due)) = self.live.get(&job) {
                if *live_version == version {
                    fired.push((job.clone(), *due));
                    self.live.remove(&job);
                }
            }
        }
        fired
    }

    /// Earliest live due time.
    pub fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.discard_stale();
        self.heap.peek().map(|Reverse((at, _, _))| *at)
    }

    pub fn has_entries(&self) -> bool {
        !self.live.is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse((_, version, job))) = self.heap.peek() {
            let stale = !self.live.get(job).is_some_and(|(v, _)| v == version);
            if !stale {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
