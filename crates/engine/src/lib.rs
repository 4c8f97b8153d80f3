// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rollcron execution engine: scheduling, execution, snapshots, retention

pub mod backoff;
pub mod env;
mod error;
mod executor;
mod job_locks;
mod job_set;
pub mod log_paths;
mod pruner;
mod run_logger;
mod runtime;
mod scheduler;
mod snapshot;

pub use error::{EngineError, PersistenceError, PruneError, SnapshotError};
pub use executor::{Executor, ExecutorConfig, DEFAULT_KILL_GRACE, DEFAULT_MAX_OUTPUT};
pub use job_locks::JobLocks;
pub use job_set::{JobSet, JobSetDiff, JobTable};
pub use pruner::{prune, PruneReport};
pub use run_logger::{RunLogger, JOB_LOG_ROTATIONS, MAX_JOB_LOG_SIZE};
pub use runtime::{Runtime, RuntimeConfig, RuntimeDeps, DEFAULT_WORKERS};
pub use scheduler::DueQueue;
pub use snapshot::{commit_message, RecoveryReport, SnapshotEngine};
