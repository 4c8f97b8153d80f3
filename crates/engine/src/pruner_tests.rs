// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use rollcron_adapters::{FakeArchiveAdapter, FakeVcsAdapter};
use rollcron_core::test_support::{archive_generation, interval_job};
use rollcron_core::{Generation, JobName, RetentionPolicy};
use rollcron_storage::RegistryStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    archive: FakeArchiveAdapter,
    engine: SnapshotEngine<FakeVcsAdapter, FakeArchiveAdapter>,
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(RegistryStore::open(dir.path().join("registry.json")).unwrap());
        let archive = FakeArchiveAdapter::new();
        let engine = SnapshotEngine::new(
            FakeVcsAdapter::new(),
            archive.clone(),
            registry,
            dir.path().join("archives"),
        );
        Self {
            dir,
            archive,
            engine,
        }
    }

    fn archives(&self) -> std::path::PathBuf {
        self.dir.path().join("archives/backup")
    }

    /// Record `n` archive generations, one per hour.
    fn seed(&self, n: u64) {
        let dir = self.archives();
        for seq in 1..=n {
            let generation = archive_generation("backup", seq, &dir, at(seq as u32));
            FakeArchiveAdapter::write_valid(generation.archive_path().unwrap()).unwrap();
            self.engine
                .registry()
                .update(|r| r.job_mut(&JobName::new("backup")).record(generation))
                .unwrap();
        }
    }

    fn generations(&self) -> Vec<Generation> {
        self.engine
            .registry()
            .read(|r| r.generations(&JobName::new("backup")).to_vec())
    }

    fn seqs(&self) -> Vec<u64> {
        self.generations().iter().map(|g| g.seq).collect()
    }

    fn pending(&self) -> bool {
        self.engine
            .registry()
            .read(|r| r.job(&JobName::new("backup")).is_some_and(|h| h.prune_pending))
    }
}

fn job(retention: RetentionPolicy) -> Job {
    let mut job = interval_job("backup", 60, "true");
    job.retention = retention;
    job
}

fn file_exists(dir: &Path, seq: u64) -> bool {
    dir.join(rollcron_core::archive_file_name(&JobName::new("backup"), seq))
        .exists()
}

#[tokio::test]
async fn keep_last_deletes_oldest() {
    let fx = Fixture::new();
    fx.seed(5);

    let report = prune(&fx.engine, &job(RetentionPolicy::keep_last(3)), at(6))
        .await
        .unwrap();

    assert_eq!(report.deleted, vec![1, 2]);
    assert_eq!(fx.seqs(), vec![3, 4, 5]);
    assert!(!file_exists(&fx.archives(), 1));
    assert!(!file_exists(&fx.archives(), 2));
    assert!(file_exists(&fx.archives(), 3));
}

#[tokio::test]
async fn prune_is_idempotent() {
    let fx = Fixture::new();
    fx.seed(5);
    let job = job(RetentionPolicy::keep_last(2));

    prune(&fx.engine, &job, at(6)).await.unwrap();
    let before = fx.generations();
    let report = prune(&fx.engine, &job, at(6)).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(fx.generations(), before);
}

#[tokio::test]
async fn keep_within_uses_age() {
    let fx = Fixture::new();
    fx.seed(5);

    let report = prune(
        &fx.engine,
        &job(RetentionPolicy::keep_within(Duration::from_secs(2 * 3600))),
        at(5),
    )
    .await
    .unwrap();

    assert_eq!(report.deleted, vec![1, 2]);
    assert_eq!(fx.seqs(), vec![3, 4, 5]);
}

#[tokio::test]
async fn keep_last_zero_keeps_newest() {
    let fx = Fixture::new();
    fx.seed(3);

    prune(&fx.engine, &job(RetentionPolicy::keep_last(0)), at(6))
        .await
        .unwrap();

    assert_eq!(fx.seqs(), vec![3]);
}

#[tokio::test]
async fn unbounded_policy_keeps_everything() {
    let fx = Fixture::new();
    fx.seed(4);

    let report = prune(&fx.engine, &job(RetentionPolicy::default()), at(6))
        .await
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(fx.seqs(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn delete_failure_keeps_record_and_flags_retry() {
    let fx = Fixture::new();
    fx.seed(4);
    let job = job(RetentionPolicy::keep_last(2));
    fx.archive.fail("delete");

    let report = prune(&fx.engine, &job, at(6)).await.unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert_eq!(fx.seqs(), vec![1, 2, 3, 4]);
    assert!(fx.pending());

    fx.archive.clear_failures();
    let report = prune(&fx.engine, &job, at(6)).await.unwrap();

    assert_eq!(report.deleted, vec![1, 2]);
    assert_eq!(fx.seqs(), vec![3, 4]);
    assert!(!fx.pending());
}

#[tokio::test]
async fn prune_without_history_does_not_write_registry() {
    let fx = Fixture::new();

    let report = prune(&fx.engine, &job(RetentionPolicy::keep_last(1)), at(0))
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(!fx.dir.path().join("registry.json").exists());
}
