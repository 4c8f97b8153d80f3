// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job async locks guarding snapshot and prune critical sections

use parking_lot::Mutex;
use rollcron_core::JobName;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per job. Different jobs never contend.
#[derive(Default)]
pub struct JobLocks {
    locks: Mutex<HashMap<JobName, Arc<AsyncMutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, job: &JobName) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.locks.lock().entry(job.clone()).or_default())
    }

    /// Wait for exclusive access to `job`'s generations.
    pub async fn lock(&self, job: &JobName) -> OwnedMutexGuard<()> {
        self.get(job).lock_owned().await
    }

    /// Wait until no critical section is in progress for any job.
    pub async fn drain(&self) {
        let locks: Vec<Arc<AsyncMutex<()>>> = self.locks.lock().values().cloned().collect();
        for lock in locks {
            drop(lock.lock().await);
        }
    }
}

#[cfg(test)]
#[path = "job_locks_tests.rs"]
mod tests;
