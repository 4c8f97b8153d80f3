// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable set of configured jobs, swapped whole on reload

use indexmap::IndexMap;
use parking_lot::RwLock;
use rollcron_core::{Job, JobName};
use std::sync::Arc;

/// Jobs in configuration order.
#[derive(Debug, Default, Clone)]
pub struct JobSet {
    jobs: IndexMap<JobName, Arc<Job>>,
}

impl JobSet {
    pub fn new(jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            jobs: jobs
                .into_iter()
                .map(|job| (job.name.clone(), Arc::new(job)))
                .collect(),
        }
    }

    pub fn get(&self, name: &JobName) -> Option<&Arc<Job>> {
        self.jobs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Job>> {
        self.jobs.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &JobName> {
        self.jobs.keys()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Differences between two job sets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobSetDiff {
    pub added: Vec<JobName>,
    pub removed: Vec<JobName>,
    /// Jobs whose definition changed.
    pub changed: Vec<JobName>,
    /// Jobs whose schedule changed; their due time is recomputed.
    pub rescheduled: Vec<JobName>,
}

impl JobSetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Shared handle to the current job set.
///
/// Readers take an `Arc` snapshot; in-flight runs keep the `Arc<Job>`
/// they started with across a replace.
#[derive(Default)]
pub struct JobTable {
    current: RwLock<Arc<JobSet>>,
}

impl JobTable {
    pub fn new(set: JobSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
        }
    }

    pub fn snapshot(&self) -> Arc<JobSet> {
        Arc::clone(&self.current.read())
    }

    pub fn get(&self, name: &JobName) -> Option<Arc<Job>> {
        self.current.read().get(name).cloned()
    }

    /// Swap in `next`, returning what changed.
    pub fn replace(&self, next: JobSet) -> JobSetDiff {
        let mut current = self.current.write();
        let diff = diff(&current, &next);
        *current = Arc::new(next);
        diff
    }
}

fn diff(old: &JobSet, new: &JobSet) -> JobSetDiff {
    let mut diff = JobSetDiff::default();
    for (name, job) in &new.jobs {
        match old.jobs.get(name) {
            None => diff.added.push(name.clone()),
            Some(prev) if prev.as_ref() != job.as_ref() => {
                diff.changed.push(name.clone());
                if prev.schedule != job.schedule || prev.enabled != job.enabled {
                    diff.rescheduled.push(name.clone());
                }
            }
            Some(_) => {}
        }
    }
    diff.removed = old
        .jobs
        .keys()
        .filter(|name| !new.jobs.contains_key(*name))
        .cloned()
        .collect();
    diff
}

#[cfg(test)]
#[path = "job_set_tests.rs"]
mod tests;
