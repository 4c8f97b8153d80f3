// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};

use crate::lifecycle::LifecycleError;

pub const STATE_DIR_VAR: &str = "ROLLCRON_STATE_DIR";

/// Resolve state directory:
/// flag > ROLLCRON_STATE_DIR > XDG_STATE_HOME/rollcron > ~/.local/state/rollcron
pub fn state_dir(flag: Option<&Path>) -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = non_empty_var(STATE_DIR_VAR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty_var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("rollcron"));
    }
    let home = non_empty_var("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/rollcron"))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
