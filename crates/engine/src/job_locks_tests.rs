// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn same_job_is_exclusive() {
    let locks = JobLocks::new();
    let guard = locks.lock(&JobName::new("a")).await;

    let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(&JobName::new("a"))).await;
    assert!(second.is_err());

    drop(guard);
    let third = tokio::time::timeout(Duration::from_millis(50), locks.lock(&JobName::new("a"))).await;
    assert!(third.is_ok());
}

#[tokio::test]
async fn different_jobs_do_not_contend() {
    let locks = JobLocks::new();
    let _a = locks.lock(&JobName::new("a")).await;

    let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(&JobName::new("b"))).await;
    assert!(b.is_ok());
}

#[tokio::test]
async fn drain_waits_for_holders() {
    let locks = Arc::new(JobLocks::new());
    let guard = locks.lock(&JobName::new("a")).await;

    let drained = tokio::time::timeout(Duration::from_millis(50), locks.drain()).await;
    assert!(drained.is_err());

    drop(guard);
    let drained = tokio::time::timeout(Duration::from_millis(50), locks.drain()).await;
    assert!(drained.is_ok());
}
