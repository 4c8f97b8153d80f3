// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::generation::Artifact;
use crate::job::JobName;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

/// Generation `seq` created `age_hours` before [`now`].
fn generation(seq: u64, age_hours: i64) -> Generation {
    Generation {
        seq,
        job: JobName::new("backup"),
        run_id: None,
        created_at: now() - chrono::Duration::hours(age_hours),
        artifact: Artifact::Archive {
            path: format!("/a/backup-{seq:06}.tar.zst").into(),
        },
        unchanged: false,
    }
}

fn seqs(gens: &[Generation]) -> Vec<u64> {
    gens.iter().map(|g| g.seq).collect()
}

#[test]
fn keep_last_keeps_newest_n() {
    let gens: Vec<_> = (1..=5).map(|s| generation(s, 10 - s as i64)).collect();
    let plan = RetentionPolicy::keep_last(3).evaluate(&gens, now());
    assert_eq!(seqs(&plan.keep), vec![3, 4, 5]);
    assert_eq!(seqs(&plan.expire), vec![1, 2]);
}

#[test]
fn keep_last_zero_is_coerced_to_one() {
    let policy = RetentionPolicy::keep_last(0);
    assert_eq!(policy.last(), Some(1));

    let gens: Vec<_> = (1..=3).map(|s| generation(s, 0)).collect();
    let plan = policy.evaluate(&gens, now());
    assert_eq!(seqs(&plan.keep), vec![3]);
}

#[test]
fn keep_within_keeps_recent() {
    let gens = vec![generation(1, 48), generation(2, 30), generation(3, 2)];
    let plan = RetentionPolicy::keep_within(Duration::from_secs(24 * 3600)).evaluate(&gens, now());
    assert_eq!(seqs(&plan.keep), vec![3]);
    assert_eq!(seqs(&plan.expire), vec![1, 2]);
}

#[test]
fn newest_survives_even_when_expired_by_age() {
    let gens = vec![generation(1, 100), generation(2, 90)];
    let plan = RetentionPolicy::keep_within(Duration::from_secs(3600)).evaluate(&gens, now());
    assert_eq!(seqs(&plan.keep), vec![2]);
}

#[test]
fn rules_combine_as_union() {
    // keep_last 1 keeps seq 4; keep_within 1d keeps 3 and 4
    let gens = vec![
        generation(1, 72),
        generation(2, 48),
        generation(3, 5),
        generation(4, 1),
    ];
    let policy = RetentionPolicy::new(Some(1), Some(Duration::from_secs(24 * 3600)));
    let plan = policy.evaluate(&gens, now());
    assert_eq!(seqs(&plan.keep), vec![3, 4]);
}

#[test]
fn no_rules_keeps_everything() {
    let gens: Vec<_> = (1..=4).map(|s| generation(s, 1000)).collect();
    let plan = RetentionPolicy::default().evaluate(&gens, now());
    assert_eq!(plan.keep.len(), 4);
    assert!(plan.expire.is_empty());
}

#[test]
fn gaps_in_sequence_are_tolerated_and_unsorted_input_is_fine() {
    let gens = vec![generation(9, 0), generation(2, 0), generation(5, 0)];
    let plan = RetentionPolicy::keep_last(2).evaluate(&gens, now());
    assert_eq!(seqs(&plan.keep), vec![5, 9]);
    assert_eq!(seqs(&plan.expire), vec![2]);
}

#[test]
fn evaluation_is_idempotent() {
    let gens: Vec<_> = (1..=6).map(|s| generation(s, 0)).collect();
    let policy = RetentionPolicy::keep_last(2);
    let first = policy.evaluate(&gens, now());
    let second = policy.evaluate(&first.keep, now());
    assert_eq!(second.keep, first.keep);
    assert!(second.expire.is_empty());
}

#[test]
fn empty_input_yields_empty_plan() {
    let plan = RetentionPolicy::keep_last(3).evaluate(&[], now());
    assert_eq!(plan, RetentionPlan::default());
}
