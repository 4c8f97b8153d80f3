// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention policy evaluation.
//!
//! Pure: takes one job's generations and a timestamp, returns which survive.

use crate::generation::Generation;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Rules selecting the generations of one job that survive pruning.
///
/// A generation survives when any rule keeps it. The newest generation
/// always survives. With no rules set, everything is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep_last: Option<usize>,
    keep_within: Option<Duration>,
}

impl RetentionPolicy {
    /// `keep_last = Some(0)` is coerced to 1.
    pub fn new(keep_last: Option<usize>, keep_within: Option<Duration>) -> Self {
        Self {
            keep_last: keep_last.map(|n| n.max(1)),
            keep_within,
        }
    }

    pub fn keep_last(n: usize) -> Self {
        Self::new(Some(n), None)
    }

    pub fn keep_within(d: Duration) -> Self {
        Self::new(None, Some(d))
    }

    pub fn last(&self) -> Option<usize> {
        self.keep_last
    }

    pub fn within(&self) -> Option<Duration> {
        self.keep_within
    }

    pub fn is_unbounded(&self) -> bool {
        self.keep_last.is_none() && self.keep_within.is_none()
    }

    /// Split `generations` into kept and expired sets.
    ///
    /// Input order does not matter; both outputs are sorted by ascending seq.
    pub fn evaluate(&self, generations: &[Generation], now: DateTime<Utc>) -> RetentionPlan {
        let mut sorted: Vec<Generation> = generations.to_vec();
        sorted.sort_by_key(|g| g.seq);

        if self.is_unbounded() {
            return RetentionPlan {
                keep: sorted,
                expire: Vec::new(),
            };
        }

        let newest_seq = sorted.last().map(|g| g.seq);
        let count = sorted.len();
        let cutoff = self
            .keep_within
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .and_then(|d| now.checked_sub_signed(d));

        let mut plan = RetentionPlan::default();
        for (idx, generation) in sorted.into_iter().enumerate() {
            let from_newest = count - idx;
            let by_count = self.keep_last.is_some_and(|n| from_newest <= n);
            let by_age = cutoff.is_some_and(|c| generation.created_at >= c);
            let newest = Some(generation.seq) == newest_seq;

            if by_count || by_age || newest {
                plan.keep.push(generation);
            } else {
                plan.expire.push(generation);
            }
        }
        plan
    }
}

/// Result of [`RetentionPolicy::evaluate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionPlan {
    pub keep: Vec<Generation>,
    pub expire: Vec<Generation>,
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
