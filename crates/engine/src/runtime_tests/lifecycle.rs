// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Start, restart, reload, manual runs and shutdown

use super::*;
use rollcron_core::{archive_file_name, FailureReason, RunOutcome};

#[tokio::test]
async fn first_start_schedules_aligned_due_time() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "backup", "true")]);
    ctx.runtime.start().await;

    let due = ctx.runtime.due(&JobName::new("backup")).unwrap();
    assert_eq!(due, DueTime::regular(ctx.clock.utc_now()));
}

#[tokio::test]
async fn tick_reschedules_from_schedule() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "backup", "true")]);
    ctx.runtime.start().await;
    let start = ctx.clock.utc_now();

    let fired = ctx.tick().await;

    assert_eq!(fired, vec![JobName::new("backup")]);
    let due = ctx.runtime.due(&JobName::new("backup")).unwrap();
    assert_eq!(due.at, start + chrono::Duration::seconds(60));
    assert_eq!(ctx.runtime.next_deadline(), Some(due.at));
}

#[tokio::test]
async fn restart_after_downtime_runs_one_catch_up() {
    let work = scratch();
    let jobs = vec![job_in(work.path(), "backup", "true")];
    let ctx = TestContext::new(jobs.clone());
    ctx.runtime.start().await;
    ctx.tick().await;

    // Down for ten intervals.
    let ctx = ctx.restart(10 * MINUTE, jobs);
    ctx.runtime.start().await;

    let due = ctx.runtime.due(&JobName::new("backup")).unwrap();
    assert!(due.catch_up);
    assert_eq!(due.at, ctx.clock.utc_now());

    let fired = ctx.tick().await;
    assert_eq!(fired.len(), 1);
    assert_eq!(ctx.count("backup", "run:started"), 2);

    // Back on the regular cadence afterwards.
    let next = ctx.runtime.due(&JobName::new("backup")).unwrap();
    assert!(!next.catch_up);
    assert!(next.at > ctx.clock.utc_now());
}

#[tokio::test]
async fn restart_without_downtime_keeps_cadence() {
    let work = scratch();
    let jobs = vec![job_in(work.path(), "backup", "true")];
    let ctx = TestContext::new(jobs.clone());
    ctx.runtime.start().await;
    let start = ctx.clock.utc_now();
    ctx.tick().await;

    let ctx = ctx.restart(Duration::from_secs(10), jobs);
    ctx.runtime.start().await;

    let due = ctx.runtime.due(&JobName::new("backup")).unwrap();
    assert!(!due.catch_up);
    assert_eq!(due.at, start + chrono::Duration::seconds(60));
}

#[tokio::test]
async fn start_adopts_orphan_archive() {
    let work = scratch();
    let jobs = vec![job_in(work.path(), "backup", "true")];
    let ctx = TestContext::new(jobs.clone());
    let orphan = ctx
        .archive_dir("backup")
        .join(archive_file_name(&JobName::new("backup"), 1));
    FakeArchiveAdapter::write_valid(&orphan).unwrap();

    ctx.runtime.start().await;

    assert_eq!(ctx.seqs("backup"), vec![1]);
    assert_eq!(ctx.count("backup", "recovery:adopted"), 1);

    ctx.tick().await;
    assert_eq!(ctx.seqs("backup"), vec![1, 2]);
}

#[tokio::test]
async fn start_prunes_beyond_retention() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "backup", "true")]);
    ctx.runtime.start().await;
    ctx.cycles(4, MINUTE).await;
    assert_eq!(ctx.seqs("backup"), vec![1, 2, 3, 4]);

    // Tighter retention takes effect at the next start.
    let ctx = ctx.restart(
        Duration::ZERO,
        vec![keep_last(job_in(work.path(), "backup", "true"), 2)],
    );
    ctx.runtime.start().await;

    assert_eq!(ctx.seqs("backup"), vec![3, 4]);
}

#[tokio::test]
async fn disabled_job_is_not_scheduled() {
    let work = scratch();
    let mut job = job_in(work.path(), "off", "true");
    job.enabled = false;
    let ctx = TestContext::new(vec![job]);
    ctx.runtime.start().await;

    assert_eq!(ctx.runtime.due(&JobName::new("off")), None);
    assert!(ctx.tick().await.is_empty());
}

#[tokio::test]
async fn reload_adds_and_removes_jobs() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "old", "true")]);
    ctx.runtime.start().await;

    let diff = ctx
        .runtime
        .reload(JobSet::new(vec![job_in(work.path(), "new", "true")]));

    assert_eq!(diff.added, vec![JobName::new("new")]);
    assert_eq!(diff.removed, vec![JobName::new("old")]);
    assert_eq!(ctx.runtime.due(&JobName::new("old")), None);
    assert!(ctx.runtime.due(&JobName::new("new")).is_some());

    let fired = ctx.tick().await;
    assert_eq!(fired, vec![JobName::new("new")]);
}

#[tokio::test]
async fn reload_keeps_in_flight_definition() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "job", "sleep 0.3; echo old")]);
    ctx.runtime.start().await;

    ctx.runtime.tick(ctx.clock.utc_now());
    ctx.runtime
        .reload(JobSet::new(vec![job_in(work.path(), "job", "echo new")]));
    ctx.runtime.wait_idle().await;

    let log = std::fs::read_to_string(ctx.state_dir().join("logs/job.log")).unwrap();
    assert!(log.contains("old"));
    assert!(!log.contains("new"));
}

#[tokio::test]
async fn run_job_now_snapshots() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "backup", "true")]);

    let run = ctx.runtime.run_job_now("backup").await.unwrap().unwrap();

    assert!(run.is_success());
    assert_eq!(ctx.seqs("backup"), vec![1]);
    assert_eq!(ctx.runtime.inflight(), 0);
}

#[tokio::test]
async fn run_job_now_unknown_job() {
    let ctx = TestContext::new(vec![]);
    let err = ctx.runtime.run_job_now("nope").await.unwrap_err();
    assert!(matches!(err, EngineError::JobNotFound(name) if name == "nope"));
}

#[tokio::test]
async fn shutdown_terminates_runs_after_grace() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "stuck", "sleep 30")]);
    ctx.runtime.start().await;

    ctx.runtime.tick(ctx.clock.utc_now());
    let started = tokio::time::Instant::now();
    ctx.runtime.shutdown(Duration::from_millis(200)).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(ctx.runtime.inflight(), 0);
    let killed = ctx.events("stuck").into_iter().any(|e| {
        matches!(
            e,
            Event::RunFinished {
                outcome: RunOutcome::Failure(FailureReason::NonZeroExit { code: None }),
                ..
            }
        )
    });
    assert!(killed);
    assert!(ctx.seqs("stuck").is_empty());
}

#[tokio::test]
async fn shutdown_lets_quick_runs_finish() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "quick", "sleep 0.2")]);
    ctx.runtime.start().await;

    ctx.runtime.tick(ctx.clock.utc_now());
    ctx.runtime.shutdown(Duration::from_secs(5)).await;

    assert_eq!(ctx.seqs("quick"), vec![1]);
}

#[tokio::test]
async fn run_loop_stops_on_shutdown_signal() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "backup", "true")]);
    ctx.runtime.start().await;
    let (tx, rx) = watch::channel(false);

    let runtime = Arc::clone(&ctx.runtime);
    let handle = tokio::spawn(async move { runtime.run_loop(rx).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
    ctx.runtime.wait_idle().await;

    // The loop dispatched the job due at start.
    assert_eq!(ctx.count("backup", "run:started"), 1);
}
