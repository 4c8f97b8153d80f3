// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use crate::subprocess::{ARCHIVE_TIMEOUT, GIT_TIMEOUT};
use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Git command timeout (default: 60s).
pub fn git_timeout() -> Duration {
    parse_duration_ms("ROLLCRON_GIT_TIMEOUT_MS").unwrap_or(GIT_TIMEOUT)
}

/// Archive create/verify timeout (default: 10m).
pub fn archive_timeout() -> Duration {
    parse_duration_ms("ROLLCRON_ARCHIVE_TIMEOUT_MS").unwrap_or(ARCHIVE_TIMEOUT)
}
