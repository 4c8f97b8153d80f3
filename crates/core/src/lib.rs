// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rollcron-core: domain types for the rollcron scheduler

pub mod calendar;
pub mod clock;
pub mod event;
pub mod generation;
pub mod id;
pub mod job;
pub mod retention;
pub mod run;
pub mod schedule;
pub mod time_fmt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use calendar::{CalendarExpr, CalendarTime};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::Event;
pub use generation::{
    archive_file_name, generation_tag, parse_archive_file_name, Artifact, Generation,
};
pub use id::{IdGen, RunId, SequentialIdGen, UuidIdGen};
pub use job::{
    is_valid_job_name, ConcurrencyPolicy, Job, JobBuilder, JobCommand, JobName, RetryConfig,
    SnapshotMode,
};
pub use retention::{RetentionPlan, RetentionPolicy};
pub use run::{CapturedOutput, FailureReason, Run, RunOutcome, TRUNCATION_MARKER};
pub use schedule::{next_due, DueTime, Schedule, ScheduleError};
pub use time_fmt::{format_duration, format_elapsed, parse_duration};
