// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared path builders for files under the state directory.
//!
//! Used by both the engine (writer) and the daemon commands (reader):
//!   `<state_dir>/registry.json`
//!   `<state_dir>/audit.jsonl`
//!   `<state_dir>/logs/<job>.log`
//!   `<state_dir>/archives/<job>/<job>-<seq>.tar.zst`

use std::path::{Path, PathBuf};

/// Structure: `{state_dir}/registry.json`
pub fn registry_path(state_dir: &Path) -> PathBuf {
    state_dir.join("registry.json")
}

/// Structure: `{state_dir}/audit.jsonl`
pub fn audit_path(state_dir: &Path) -> PathBuf {
    state_dir.join("audit.jsonl")
}

/// Structure: `{state_dir}/logs`
pub fn logs_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("logs")
}

/// Build the path to a job's run log.
///
/// Structure: `{logs_dir}/{job}.log`
pub fn job_log_path(logs_dir: &Path, job: &str) -> PathBuf {
    logs_dir.join(format!("{}.log", job))
}

/// Default root for archive generations.
///
/// Structure: `{state_dir}/archives`
pub fn archives_root(state_dir: &Path) -> PathBuf {
    state_dir.join("archives")
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;
