// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for git commands.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for archive creation and verification.
/// Output directories can be large, so this is generous.
pub const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(600);

/// Timeout for `kill` invocations.
pub const SIGNAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed when the timeout elapses.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Send `signal` (e.g. `"TERM"`, `"KILL"`, `"0"`) to every process in group `pgid`.
///
/// Returns false when no process received it.
pub async fn signal_group(pgid: u32, signal: &str) -> bool {
    let mut cmd = Command::new("kill");
    cmd.arg(format!("-{signal}"))
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    run_with_timeout(cmd, SIGNAL_TIMEOUT, "kill")
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Send `signal` to the single process `pid`.
pub async fn signal_process(pid: u32, signal: &str) -> bool {
    let mut cmd = Command::new("kill");
    cmd.arg(format!("-{signal}"))
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    run_with_timeout(cmd, SIGNAL_TIMEOUT, "kill")
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check whether any process of group `pgid` still exists.
pub async fn group_alive(pgid: u32) -> bool {
    signal_group(pgid, "0").await
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
