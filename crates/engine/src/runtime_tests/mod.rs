// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tests

mod concurrency;
mod lifecycle;
mod scenarios;

use super::*;
use rollcron_adapters::{FakeArchiveAdapter, FakeVcsAdapter};
use rollcron_core::test_support::interval_job;
use rollcron_core::{FakeClock, RetentionPolicy, SequentialIdGen};
use rollcron_storage::{read_job_entries, AuditEntry};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type TestRuntime = Runtime<FakeVcsAdapter, FakeArchiveAdapter, FakeClock, SequentialIdGen>;

/// Test context holding the runtime and its fakes
struct TestContext {
    runtime: Arc<TestRuntime>,
    clock: FakeClock,
    vcs: FakeVcsAdapter,
    archive: FakeArchiveAdapter,
    dir: TempDir,
}

impl TestContext {
    fn new(jobs: Vec<Job>) -> Self {
        let dir = TempDir::new().unwrap();
        Self::in_dir(dir, FakeClock::new(), jobs)
    }

    /// Build a runtime over an existing state directory (simulates a restart).
    fn in_dir(dir: TempDir, clock: FakeClock, jobs: Vec<Job>) -> Self {
        let vcs = FakeVcsAdapter::new();
        let archive = FakeArchiveAdapter::new();
        let deps = RuntimeDeps {
            vcs: vcs.clone(),
            archive: archive.clone(),
            clock: clock.clone(),
            ids: SequentialIdGen::new("run"),
        };
        let mut config = RuntimeConfig::new(dir.path().join("state"));
        config.executor.kill_grace = Duration::from_millis(500);
        let runtime = Runtime::new(deps, config, JobSet::new(jobs)).unwrap();
        Self {
            runtime,
            clock,
            vcs,
            archive,
            dir,
        }
    }

    fn restart(self, advance: Duration, jobs: Vec<Job>) -> Self {
        let clock = self.clock.clone();
        clock.advance(advance);
        let dir = self.dir;
        drop(self.runtime);
        Self::in_dir(dir, clock, jobs)
    }

    fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    fn archive_dir(&self, job: &str) -> PathBuf {
        self.state_dir().join("archives").join(job)
    }

    /// Tick at the current fake time and wait for all dispatched runs.
    async fn tick(&self) -> Vec<JobName> {
        let fired = self.runtime.tick(self.clock.utc_now());
        self.runtime.wait_idle().await;
        fired
    }

    /// Tick, then advance the clock by the interval, `n` times.
    async fn cycles(&self, n: usize, every: Duration) {
        for _ in 0..n {
            self.tick().await;
            self.clock.advance(every);
        }
    }

    fn seqs(&self, job: &str) -> Vec<u64> {
        self.runtime
            .generations(&JobName::new(job))
            .iter()
            .map(|g| g.seq)
            .collect()
    }

    fn events(&self, job: &str) -> Vec<Event> {
        read_job_entries(
            &log_paths::audit_path(&self.state_dir()),
            &JobName::new(job),
        )
        .unwrap()
        .into_iter()
        .map(|e: AuditEntry| e.event)
        .collect()
    }

    fn count(&self, job: &str, event_name: &str) -> usize {
        self.events(job)
            .iter()
            .filter(|e| e.name() == event_name)
            .count()
    }
}

/// Archive job on a 60s interval with its own working and output directories.
fn job_in(dir: &Path, name: &str, command: &str) -> Job {
    let work = dir.join("work").join(name);
    let out = dir.join("out").join(name);
    std::fs::create_dir_all(&work).unwrap();
    std::fs::create_dir_all(&out).unwrap();
    let mut job = interval_job(name, 60, command);
    job.working_dir = work;
    job.output_dir = Some(out);
    job
}

/// Shared scratch directory for job definitions made before the context.
fn scratch() -> TempDir {
    TempDir::new().unwrap()
}

const MINUTE: Duration = Duration::from_secs(60);

fn keep_last(mut job: Job, n: usize) -> Job {
    job.retention = RetentionPolicy::keep_last(n);
    job
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
