// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use rollcron_adapters::{ArchiveCall, FakeArchiveAdapter, FakeVcsAdapter, VcsCall};
use rollcron_core::test_support::interval_job;
use rollcron_core::{CapturedOutput, RunId, RunOutcome};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    vcs: FakeVcsAdapter,
    archive: FakeArchiveAdapter,
    engine: SnapshotEngine<FakeVcsAdapter, FakeArchiveAdapter>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(RegistryStore::open(dir.path().join("registry.json")).unwrap());
        let vcs = FakeVcsAdapter::new();
        let archive = FakeArchiveAdapter::new();
        let engine = SnapshotEngine::new(
            vcs.clone(),
            archive.clone(),
            registry,
            dir.path().join("archives"),
        );
        Self {
            dir,
            vcs,
            archive,
            engine,
        }
    }

    fn job(&self, mode: SnapshotMode) -> Job {
        let out = self.dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let mut job = interval_job("backup", 60, "true");
        job.output_dir = Some(out);
        job.snapshot = mode;
        job
    }

    fn generations(&self) -> Vec<Generation> {
        self.engine
            .registry()
            .read(|r| r.generations(&JobName::new("backup")).to_vec())
    }

    fn archive_path(&self, seq: u64) -> PathBuf {
        self.dir
            .path()
            .join("archives/backup")
            .join(archive_file_name(&JobName::new("backup"), seq))
    }
}

fn at(min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, min, 0).unwrap()
}

fn success_run(n: u32) -> Run {
    Run {
        id: RunId::new(format!("run-{n}")),
        job: JobName::new("backup"),
        attempt: 1,
        started_at: at(n),
        finished_at: at(n),
        exit_code: Some(0),
        output: CapturedOutput::default(),
        outcome: RunOutcome::Success,
    }
}

#[tokio::test]
async fn archive_create_records_generation() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);

    let generation = fx.engine.create(&job, &success_run(1)).await.unwrap().unwrap();

    assert_eq!(generation.seq, 1);
    assert_eq!(generation.run_id, Some(RunId::new("run-1")));
    assert_eq!(generation.archive_path(), Some(&fx.archive_path(1)));
    assert!(fx.archive_path(1).exists());
    assert!(!tmp_path_for(&fx.archive_path(1)).exists());
    assert_eq!(fx.generations(), vec![generation.clone()]);
    assert!(fx.engine.verify(&job, &generation).await.unwrap());
}

#[tokio::test]
async fn archive_is_written_to_temp_then_verified() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);

    fx.engine.create(&job, &success_run(1)).await.unwrap();

    assert_eq!(
        fx.archive.calls(),
        vec![
            ArchiveCall::Create {
                source: fx.dir.path().join("out"),
                dest: tmp_path_for(&fx.archive_path(1)),
            },
            ArchiveCall::Verify {
                path: fx.archive_path(1),
            },
        ]
    );
}

#[tokio::test]
async fn sequence_numbers_increase() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);

    for n in 1..=3 {
        fx.engine.create(&job, &success_run(n)).await.unwrap();
    }

    let seqs: Vec<u64> = fx.generations().iter().map(|g| g.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[tokio::test]
async fn failed_archive_create_leaves_no_record() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    fx.archive.fail("create");

    let err = fx.engine.create(&job, &success_run(1)).await.unwrap_err();

    assert_eq!(err.kind(), "archive");
    assert!(fx.generations().is_empty());
    assert!(!fx.archive_path(1).exists());
    assert!(!tmp_path_for(&fx.archive_path(1)).exists());

    // The next success reuses the sequence number.
    fx.archive.clear_failures();
    let generation = fx.engine.create(&job, &success_run(2)).await.unwrap().unwrap();
    assert_eq!(generation.seq, 1);
}

#[tokio::test]
async fn failed_verify_deletes_archive() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    fx.archive.fail("verify");

    assert!(fx.engine.create(&job, &success_run(1)).await.is_err());
    assert!(!fx.archive_path(1).exists());
    assert!(fx.generations().is_empty());
}

#[tokio::test]
async fn snapshot_disabled_returns_none() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::None);

    assert_eq!(fx.engine.create(&job, &success_run(1)).await.unwrap(), None);
    assert!(fx.archive.calls().is_empty());
}

#[tokio::test]
async fn missing_output_dir_is_an_error() {
    let fx = Fixture::new();
    let mut job = fx.job(SnapshotMode::Archive);
    job.output_dir = None;

    let err = fx.engine.create(&job, &success_run(1)).await.unwrap_err();
    assert!(matches!(err, SnapshotError::NoOutputDir(_)));
}

#[tokio::test]
async fn git_create_commits_and_tags() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Git);
    let out = fx.dir.path().join("out");
    fx.vcs.set_next_changes(2);

    let generation = fx.engine.create(&job, &success_run(1)).await.unwrap().unwrap();

    assert!(!generation.unchanged);
    assert_eq!(generation.tag(), Some("rollcron/backup/1"));
    let commit = generation.commit_id().unwrap().to_string();
    assert_eq!(fx.vcs.tags(&out).get("rollcron/backup/1"), Some(&commit));
    assert!(fx.vcs.calls().contains(&VcsCall::Commit {
        path: out.clone(),
        message: "rollcron: backup run run-1 at 2026-01-01T00:01:00Z\n\n2 files changed"
            .to_string(),
        allow_empty: true,
    }));
}

#[tokio::test]
async fn git_without_changes_records_unchanged_generation() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Git);
    let out = fx.dir.path().join("out");

    let first = fx.engine.create(&job, &success_run(1)).await.unwrap().unwrap();
    fx.vcs.set_next_changes(0);
    let second = fx.engine.create(&job, &success_run(2)).await.unwrap().unwrap();

    assert!(second.unchanged);
    assert_eq!(second.seq, 2);
    assert_eq!(second.commit_id(), first.commit_id());
    assert_eq!(fx.vcs.commit_count(&out), 1);
    // The unchanged generation gets its own tag on the reused commit
    let tags = fx.vcs.tags(&out);
    assert_eq!(tags.len(), 2);
    assert_eq!(
        tags.get(&generation_tag(&job.name, 2)).map(String::as_str),
        first.commit_id()
    );
}

#[tokio::test]
async fn git_commit_failure_is_snapshot_error() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Git);
    fx.vcs.fail("commit");

    let err = fx.engine.create(&job, &success_run(1)).await.unwrap_err();
    assert_eq!(err.kind(), "vcs");
    assert!(fx.generations().is_empty());
}

#[tokio::test]
async fn delete_commit_generation_removes_tag_only() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Git);
    let out = fx.dir.path().join("out");
    let generation = fx.engine.create(&job, &success_run(1)).await.unwrap().unwrap();

    fx.engine.delete(&job, &generation).await.unwrap();

    assert!(fx.vcs.tags(&out).is_empty());
    assert_eq!(fx.vcs.commit_count(&out), 1);
}

#[tokio::test]
async fn verify_reports_missing_archive() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    let generation = fx.engine.create(&job, &success_run(1)).await.unwrap().unwrap();

    std::fs::remove_file(fx.archive_path(1)).unwrap();
    assert!(!fx.engine.verify(&job, &generation).await.unwrap());
}

// ── recovery ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recovery_removes_temp_files() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    let tmp = tmp_path_for(&fx.archive_path(4));
    std::fs::create_dir_all(tmp.parent().unwrap()).unwrap();
    std::fs::write(&tmp, "partial").unwrap();

    let report = fx.engine.recover(&job, at(0)).await.unwrap();

    assert_eq!(report.temp_removed, 1);
    assert!(!tmp.exists());
    assert!(fx.generations().is_empty());
}

#[tokio::test]
async fn recovery_adopts_valid_orphan_archive() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    FakeArchiveAdapter::write_valid(&fx.archive_path(7)).unwrap();

    let report = fx.engine.recover(&job, at(0)).await.unwrap();

    assert_eq!(report.adopted, vec![7]);
    let generations = fx.generations();
    assert_eq!(generations.len(), 1);
    assert_eq!(generations[0].seq, 7);
    assert_eq!(generations[0].run_id, None);

    // Sequence numbers continue past the adopted one.
    let next = fx.engine.create(&job, &success_run(1)).await.unwrap().unwrap();
    assert_eq!(next.seq, 8);
}

#[tokio::test]
async fn recovery_discards_corrupt_orphan_archive() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    let path = fx.archive_path(2);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "garbage").unwrap();

    let report = fx.engine.recover(&job, at(0)).await.unwrap();

    assert!(report.adopted.is_empty());
    assert_eq!(report.discarded.len(), 1);
    assert_eq!(report.discarded[0].0, 2);
    assert!(!path.exists());
}

#[tokio::test]
async fn recovery_drops_records_with_missing_archive() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    fx.engine.create(&job, &success_run(1)).await.unwrap();
    fx.engine.create(&job, &success_run(2)).await.unwrap();
    std::fs::remove_file(fx.archive_path(1)).unwrap();

    let report = fx.engine.recover(&job, at(0)).await.unwrap();

    assert_eq!(report.discarded, vec![(1, "archive file missing".to_string())]);
    let seqs: Vec<u64> = fx.generations().iter().map(|g| g.seq).collect();
    assert_eq!(seqs, vec![2]);
}

#[tokio::test]
async fn recovery_ignores_unrelated_files() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    let dir = fx.dir.path().join("archives/backup");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("README"), "keep me").unwrap();
    std::fs::write(dir.join("other-000001.tar.zst"), "not ours").unwrap();

    let report = fx.engine.recover(&job, at(0)).await.unwrap();

    assert!(report.is_empty());
    assert!(dir.join("README").exists());
    assert!(dir.join("other-000001.tar.zst").exists());
}

#[tokio::test]
async fn recovery_adopts_orphan_tag() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Git);
    let out = fx.dir.path().join("out");
    let commit = fx.vcs.add_commit(&out, "rollcron: backup run r at t");
    fx.vcs.tag(&out, "rollcron/backup/3", &commit).await.unwrap();

    let report = fx.engine.recover(&job, at(5)).await.unwrap();

    assert_eq!(report.adopted, vec![3]);
    let generations = fx.generations();
    assert_eq!(generations[0].commit_id(), Some(commit.as_str()));
    assert_eq!(generations[0].tag(), Some("rollcron/backup/3"));
}

#[tokio::test]
async fn recovery_tags_untagged_rollcron_head() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Git);
    let out = fx.dir.path().join("out");
    fx.engine.create(&job, &success_run(1)).await.unwrap();
    // Crash after commit, before tag.
    let commit = fx.vcs.add_commit(&out, "rollcron: backup run run-2 at t");

    let report = fx.engine.recover(&job, at(5)).await.unwrap();

    assert_eq!(report.adopted, vec![2]);
    assert_eq!(fx.vcs.tags(&out).get("rollcron/backup/2"), Some(&commit));
}

#[tokio::test]
async fn recovery_leaves_foreign_head_alone() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Git);
    let out = fx.dir.path().join("out");
    fx.engine.create(&job, &success_run(1)).await.unwrap();
    fx.vcs.add_commit(&out, "manual edit");

    let report = fx.engine.recover(&job, at(5)).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(fx.generations().len(), 1);
}

#[tokio::test]
async fn recovery_is_idempotent() {
    let fx = Fixture::new();
    let job = fx.job(SnapshotMode::Archive);
    fx.engine.create(&job, &success_run(1)).await.unwrap();
    FakeArchiveAdapter::write_valid(&fx.archive_path(5)).unwrap();

    fx.engine.recover(&job, at(0)).await.unwrap();
    let before = fx.generations();
    let report = fx.engine.recover(&job, at(0)).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(fx.generations(), before);
}

#[test]
fn commit_message_singular_file() {
    let msg = commit_message(&JobName::new("backup"), &success_run(3), 1);
    assert_eq!(msg, "rollcron: backup run run-3 at 2026-01-01T00:03:00Z\n\n1 file changed");
}
