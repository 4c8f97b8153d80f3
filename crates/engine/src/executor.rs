// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job command execution
//!
//! Each run spawns the job's command as the leader of a new process group.
//! On timeout or cancellation the whole group receives SIGTERM, then SIGKILL
//! after the grace period, and the leader is reaped before returning.

use crate::env;
use parking_lot::Mutex;
use rollcron_adapters::subprocess::signal_group;
use rollcron_core::{
    CapturedOutput, Clock, FailureReason, Job, Run, RunId, RunOutcome, TRUNCATION_MARKER,
};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default bytes captured per stream.
pub const DEFAULT_MAX_OUTPUT: usize = 64 * 1024;

/// Default SIGTERM to SIGKILL grace period.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How long to keep reading output after the leader exits.
/// Background children can hold the pipes open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Bytes captured per stream before truncating.
    pub max_output: usize,
    pub kill_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_output: DEFAULT_MAX_OUTPUT,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Runs job commands and turns them into [`Run`] records.
#[derive(Clone)]
pub struct Executor<C: Clock> {
    clock: C,
    config: ExecutorConfig,
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

impl<C: Clock> Executor<C> {
    pub fn new(clock: C, config: ExecutorConfig) -> Self {
        Self { clock, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one attempt of `job`.
    ///
    /// Never fails: spawn errors, non-zero exits, timeouts and cancellation
    /// all become a failed [`Run`].
    pub async fn run(
        &self,
        job: &Job,
        run_id: RunId,
        attempt: u32,
        cancel: &mut watch::Receiver<bool>,
    ) -> Run {
        let started_at = self.clock.utc_now();
        let finish = |exit_code, output, outcome| Run {
            id: run_id.clone(),
            job: job.name.clone(),
            attempt,
            started_at,
            finished_at: self.clock.utc_now(),
            exit_code,
            output,
            outcome,
        };

        let Some((program, args)) = job.command.program_and_args() else {
            return finish(
                None,
                CapturedOutput::default(),
                RunOutcome::Failure(FailureReason::Spawn {
                    message: "empty command".to_string(),
                }),
            );
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&job.working_dir)
            .envs(env::job_env(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(job = %job.name, run_id = %run_id, error = %e, "spawn failed");
                return finish(
                    None,
                    CapturedOutput::default(),
                    RunOutcome::Failure(FailureReason::Spawn {
                        message: e.to_string(),
                    }),
                );
            }
        };
        let pgid = child.id();
        tracing::debug!(job = %job.name, run_id = %run_id, ?pgid, "spawned");

        let stdout = spawn_capture(child.stdout.take(), self.config.max_output);
        let stderr = spawn_capture(child.stderr.take(), self.config.max_output);

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            after = deadline(job.timeout) => Waited::TimedOut(after),
            _ = cancelled(cancel) => Waited::Cancelled,
        };

        let (exit_code, outcome) = match waited {
            Waited::Exited(Ok(status)) => {
                // Leader is gone; anything it left behind in the group goes too.
                if let Some(pgid) = pgid {
                    signal_group(pgid, "KILL").await;
                }
                let code = status.code();
                let outcome = if status.success() {
                    RunOutcome::Success
                } else {
                    RunOutcome::Failure(FailureReason::NonZeroExit { code })
                };
                (code, outcome)
            }
            Waited::Exited(Err(e)) => {
                let status = self.terminate(&mut child, pgid).await;
                (
                    status.and_then(|s| s.code()),
                    RunOutcome::Failure(FailureReason::Spawn {
                        message: format!("wait failed: {e}"),
                    }),
                )
            }
            Waited::TimedOut(after) => {
                tracing::warn!(
                    job = %job.name,
                    run_id = %run_id,
                    timeout_ms = after.as_millis() as u64,
                    "run timed out, terminating process group"
                );
                self.terminate(&mut child, pgid).await;
                (
                    None,
                    RunOutcome::Failure(FailureReason::Timeout {
                        after_ms: after.as_millis() as u64,
                    }),
                )
            }
            Waited::Cancelled => {
                tracing::info!(job = %job.name, run_id = %run_id, "run cancelled");
                self.terminate(&mut child, pgid).await;
                (None, RunOutcome::Failure(FailureReason::NonZeroExit { code: None }))
            }
        };

        let stdout = stdout.collect().await;
        let stderr = stderr.collect().await;
        let output = CapturedOutput {
            truncated: stdout.1 || stderr.1,
            stdout: stdout.0,
            stderr: stderr.0,
        };
        finish(exit_code, output, outcome)
    }

    /// SIGTERM the group, wait out the grace period, SIGKILL, reap.
    async fn terminate(&self, child: &mut Child, pgid: Option<u32>) -> Option<ExitStatus> {
        match pgid {
            Some(pgid) => {
                signal_group(pgid, "TERM").await;
            }
            None => {
                let _ = child.start_kill();
            }
        }

        let status = match tokio::time::timeout(self.config.kill_grace, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            _ => None,
        };

        if let Some(pgid) = pgid {
            signal_group(pgid, "KILL").await;
        }
        match status {
            Some(status) => Some(status),
            None => {
                let _ = child.start_kill();
                child.wait().await.ok()
            }
        }
    }
}

async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(after) => {
            tokio::time::sleep(after).await;
            after
        }
        None => std::future::pending().await,
    }
}

/// Resolves once `cancel` turns true; never resolves if the sender is gone.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Bounded buffer for one output stream. Excess bytes are read and dropped.
struct Capture {
    buf: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl Capture {
    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&chunk[..room.min(chunk.len())]);
    }

    fn text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.buf).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

struct CaptureTask {
    capture: Arc<Mutex<Capture>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureTask {
    /// Wait briefly for EOF, then return whatever was captured.
    async fn collect(mut self) -> (String, bool) {
        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }
        let capture = self.capture.lock();
        (capture.text(), capture.truncated)
    }
}

fn spawn_capture<R>(stream: Option<R>, limit: usize) -> CaptureTask
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let capture = Arc::new(Mutex::new(Capture {
        buf: Vec::new(),
        limit,
        truncated: false,
    }));
    let handle = stream.map(|mut stream| {
        let capture = Arc::clone(&capture);
        tokio::spawn(async move {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => capture.lock().push(&chunk[..n]),
                }
            }
        })
    });
    CaptureTask { capture, handle }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
