// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only logger for per-job run logs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rollcron_core::{JobName, Run};
use rollcron_storage::rotate_if_larger;

use crate::log_paths;

/// Append-only logger for per-job run logs.
///
/// Writes human-readable timestamped lines to:
///   `<logs_dir>/<job>.log`
///
/// Format: `2026-01-30T08:14:09Z [run] message`
///
/// Each call opens, writes, and closes the file. A log past `max_size`
/// bytes is rotated to `<job>.log.1` first; [`JOB_LOG_ROTATIONS`] are kept.
pub struct RunLogger {
    logs_dir: PathBuf,
    max_size: u64,
}

/// Default size past which a job log is rotated.
pub const MAX_JOB_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated job logs kept.
pub const JOB_LOG_ROTATIONS: u32 = 3;

impl RunLogger {
    pub fn new(logs_dir: PathBuf) -> Self {
        Self {
            logs_dir,
            max_size: MAX_JOB_LOG_SIZE,
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Append a single tagged line for the given job.
    ///
    /// Failures are logged via tracing but do not propagate; logging
    /// must not break the engine.
    pub fn append(&self, job: &JobName, at: DateTime<Utc>, tag: &str, message: &str) {
        let path = log_paths::job_log_path(&self.logs_dir, job.as_str());
        let ts = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let text = format!("{} [{}] {}\n", ts, tag, message);
        if let Err(e) = write_text(&path, &text, self.max_size) {
            tracing::warn!(job = %job, error = %e, "failed to write run log");
        }
    }

    /// Append a finished run: a summary line followed by its captured output.
    pub fn append_run(&self, run: &Run) {
        let path = log_paths::job_log_path(&self.logs_dir, run.job.as_str());
        if let Err(e) = write_text(&path, &format_run(run), self.max_size) {
            tracing::warn!(job = %run.job, run_id = %run.id, error = %e, "failed to write run log");
        }
    }
}

fn format_run(run: &Run) -> String {
    let ts = run.finished_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut text = format!(
        "{} [run] {} attempt={} outcome={} ms={}\n",
        ts,
        run.id,
        run.attempt,
        run.outcome,
        run.duration_ms()
    );
    for (stream, body) in [("stdout", &run.output.stdout), ("stderr", &run.output.stderr)] {
        if body.is_empty() {
            continue;
        }
        text.push_str(&format!("{} [{}]\n", ts, stream));
        text.push_str(body);
        if !body.ends_with('\n') {
            text.push('\n');
        }
    }
    text
}

fn write_text(path: &Path, text: &str, max_size: u64) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    rotate_if_larger(path, max_size, JOB_LOG_ROTATIONS)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
#[path = "run_logger_tests.rs"]
mod tests;
