// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios with real commands and fake snapshot adapters

use super::*;
use rollcron_core::{FailureReason, RetryConfig, RunOutcome, SnapshotMode};

#[tokio::test]
async fn backup_keeps_last_three_archives() {
    let work = scratch();
    let ctx = TestContext::new(vec![keep_last(job_in(work.path(), "backup", "true"), 3)]);
    ctx.runtime.start().await;

    ctx.cycles(5, MINUTE).await;

    assert_eq!(ctx.seqs("backup"), vec![3, 4, 5]);
    assert_eq!(file_count(&ctx.archive_dir("backup")), 3);
    assert_eq!(ctx.count("backup", "run:finished"), 5);
    assert_eq!(ctx.count("backup", "snapshot:created"), 5);
    assert_eq!(ctx.count("backup", "prune:deleted"), 2);
}

#[tokio::test]
async fn flaky_job_records_failures_without_generations() {
    let work = scratch();
    let ctx = TestContext::new(vec![
        job_in(work.path(), "flaky", "exit 1"),
        job_in(work.path(), "steady", "true"),
    ]);
    ctx.runtime.start().await;

    ctx.cycles(3, MINUTE).await;

    assert!(ctx.seqs("flaky").is_empty());
    let failures = ctx
        .events("flaky")
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                Event::RunFinished {
                    outcome: RunOutcome::Failure(FailureReason::NonZeroExit { code: Some(1) }),
                    ..
                }
            )
        })
        .count();
    assert_eq!(failures, 3);
    assert_eq!(ctx.count("flaky", "snapshot:created"), 0);

    // The other job is unaffected and both remain scheduled.
    assert_eq!(ctx.seqs("steady"), vec![1, 2, 3]);
    assert!(ctx.runtime.due(&JobName::new("flaky")).is_some());
    assert!(ctx.runtime.due(&JobName::new("steady")).is_some());
}

#[tokio::test]
async fn run_timeout_is_recorded_as_failure() {
    let work = scratch();
    let mut job = job_in(work.path(), "slow", "sleep 10");
    job.timeout = Some(Duration::from_millis(300));
    let ctx = TestContext::new(vec![job]);
    ctx.runtime.start().await;

    ctx.tick().await;

    let timed_out = ctx.events("slow").into_iter().any(|e| {
        matches!(
            e,
            Event::RunFinished {
                outcome: RunOutcome::Failure(FailureReason::Timeout { after_ms: 300 }),
                ..
            }
        )
    });
    assert!(timed_out);
    assert!(ctx.seqs("slow").is_empty());
}

#[tokio::test]
async fn retries_until_success() {
    let work = scratch();
    let script = "n=$(cat count 2>/dev/null || echo 0); n=$((n+1)); echo $n > count; [ $n -ge 2 ]";
    let mut job = job_in(work.path(), "retry", script);
    job.retry = RetryConfig {
        max: 3,
        delay: Duration::from_millis(10),
        jitter: Duration::ZERO,
    };
    let ctx = TestContext::new(vec![job]);
    ctx.runtime.start().await;

    ctx.tick().await;

    let attempts: Vec<u32> = ctx
        .events("retry")
        .into_iter()
        .filter_map(|e| match e {
            Event::RunStarted { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2]);
    assert_eq!(ctx.seqs("retry"), vec![1]);
}

#[tokio::test]
async fn retries_stop_at_max() {
    let work = scratch();
    let mut job = job_in(work.path(), "doomed", "exit 2");
    job.retry = RetryConfig {
        max: 2,
        delay: Duration::ZERO,
        jitter: Duration::ZERO,
    };
    let ctx = TestContext::new(vec![job]);
    ctx.runtime.start().await;

    ctx.tick().await;

    assert_eq!(ctx.count("doomed", "run:started"), 3);
    assert_eq!(ctx.count("doomed", "run:finished"), 3);
}

#[tokio::test]
async fn snapshot_failure_is_recorded_and_next_success_retries() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "backup", "true")]);
    ctx.runtime.start().await;
    ctx.archive.fail("create");

    ctx.tick().await;
    assert_eq!(ctx.count("backup", "snapshot:failed"), 1);
    assert!(ctx.seqs("backup").is_empty());

    ctx.archive.clear_failures();
    ctx.clock.advance(MINUTE);
    ctx.tick().await;
    assert_eq!(ctx.seqs("backup"), vec![1]);
}

#[tokio::test]
async fn git_mode_tags_each_generation() {
    let work = scratch();
    let mut job = keep_last(job_in(work.path(), "site", "true"), 2);
    job.snapshot = SnapshotMode::Git;
    let out = job.output_dir.clone().unwrap();
    let ctx = TestContext::new(vec![job]);
    ctx.runtime.start().await;

    ctx.cycles(3, MINUTE).await;

    assert_eq!(ctx.seqs("site"), vec![2, 3]);
    let tags: Vec<String> = ctx.vcs.tags(&out).into_keys().collect();
    assert_eq!(tags, vec!["rollcron/site/2", "rollcron/site/3"]);
    // Pruning never removes commits.
    assert_eq!(ctx.vcs.commit_count(&out), 3);
}

#[tokio::test]
async fn snapshot_disabled_job_only_runs() {
    let work = scratch();
    let mut job = job_in(work.path(), "plain", "echo hi");
    job.snapshot = SnapshotMode::None;
    let ctx = TestContext::new(vec![job]);
    ctx.runtime.start().await;

    ctx.tick().await;

    assert_eq!(ctx.count("plain", "run:finished"), 1);
    assert!(ctx.seqs("plain").is_empty());
    assert!(ctx.archive.calls().is_empty());
}

#[tokio::test]
async fn failed_prune_is_retried_next_cycle() {
    let work = scratch();
    let ctx = TestContext::new(vec![keep_last(job_in(work.path(), "backup", "true"), 1)]);
    ctx.runtime.start().await;
    ctx.archive.fail("delete");

    ctx.cycles(2, MINUTE).await;
    assert_eq!(ctx.seqs("backup"), vec![1, 2]);
    assert_eq!(ctx.count("backup", "prune:failed"), 1);

    ctx.archive.clear_failures();
    ctx.tick().await;
    assert_eq!(ctx.seqs("backup"), vec![3]);
}

#[tokio::test]
async fn run_output_goes_to_job_log() {
    let work = scratch();
    let ctx = TestContext::new(vec![job_in(work.path(), "chatty", "echo hello-from-job")]);
    ctx.runtime.start().await;

    ctx.tick().await;

    let log = std::fs::read_to_string(ctx.state_dir().join("logs/chatty.log")).unwrap();
    assert!(log.contains("[run] run-1 attempt=1 outcome=success"));
    assert!(log.contains("hello-from-job"));
}
