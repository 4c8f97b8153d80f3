// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency policy when a tick arrives while a run is active

use super::*;
use rollcron_core::ConcurrencyPolicy;

fn slow_job(dir: &Path, name: &str, policy: ConcurrencyPolicy) -> Job {
    let mut job = job_in(dir, name, "sleep 0.5");
    job.concurrency = policy;
    job
}

/// Fire ticks back to back without waiting for runs in between.
fn rapid_ticks(ctx: &TestContext, n: usize) {
    for _ in 0..n {
        ctx.runtime.tick(ctx.clock.utc_now());
        ctx.clock.advance(MINUTE);
    }
}

#[tokio::test]
async fn skip_drops_ticks_while_running() {
    let work = scratch();
    let ctx = TestContext::new(vec![slow_job(work.path(), "skipper", ConcurrencyPolicy::Skip)]);
    ctx.runtime.start().await;

    rapid_ticks(&ctx, 3);
    ctx.runtime.wait_idle().await;

    assert_eq!(ctx.count("skipper", "run:started"), 1);
    assert_eq!(ctx.count("skipper", "tick:skipped"), 2);
    assert_eq!(ctx.seqs("skipper"), vec![1]);
}

#[tokio::test]
async fn queue_keeps_one_pending_run() {
    let work = scratch();
    let ctx = TestContext::new(vec![slow_job(work.path(), "queued", ConcurrencyPolicy::Queue)]);
    ctx.runtime.start().await;

    rapid_ticks(&ctx, 4);
    ctx.runtime.wait_idle().await;

    assert_eq!(ctx.count("queued", "run:queued"), 1);
    assert_eq!(ctx.count("queued", "tick:coalesced"), 2);
    assert_eq!(ctx.count("queued", "run:started"), 2);
    assert_eq!(ctx.seqs("queued"), vec![1, 2]);
}

#[tokio::test]
async fn overlap_runs_concurrently() {
    let work = scratch();
    let ctx = TestContext::new(vec![slow_job(work.path(), "parallel", ConcurrencyPolicy::Overlap)]);
    ctx.runtime.start().await;

    rapid_ticks(&ctx, 3);
    assert_eq!(ctx.runtime.inflight(), 3);
    ctx.runtime.wait_idle().await;

    assert_eq!(ctx.count("parallel", "run:started"), 3);
    // Sequence numbers follow completion order and never repeat.
    assert_eq!(ctx.seqs("parallel"), vec![1, 2, 3]);
}

#[tokio::test]
async fn jobs_do_not_block_each_other() {
    let work = scratch();
    let ctx = TestContext::new(vec![
        slow_job(work.path(), "slow", ConcurrencyPolicy::Skip),
        job_in(work.path(), "fast", "true"),
    ]);
    ctx.runtime.start().await;

    ctx.runtime.tick(ctx.clock.utc_now());
    tokio::time::sleep(Duration::from_millis(200)).await;
    ctx.clock.advance(MINUTE);
    ctx.runtime.tick(ctx.clock.utc_now());
    ctx.runtime.wait_idle().await;

    assert_eq!(ctx.count("slow", "tick:skipped"), 1);
    assert_eq!(ctx.count("fast", "run:started"), 2);
    assert_eq!(ctx.count("fast", "tick:skipped"), 0);
}

#[tokio::test]
async fn skip_allows_next_tick_after_completion() {
    let work = scratch();
    let ctx = TestContext::new(vec![slow_job(work.path(), "skipper", ConcurrencyPolicy::Skip)]);
    ctx.runtime.start().await;

    ctx.cycles(2, MINUTE).await;

    assert_eq!(ctx.count("skipper", "run:started"), 2);
    assert_eq!(ctx.count("skipper", "tick:skipped"), 0);
}
