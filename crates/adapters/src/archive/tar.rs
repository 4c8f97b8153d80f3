// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tar` CLI piped through zstd

use super::{ArchiveAdapter, ArchiveError};
use async_trait::async_trait;
use crate::subprocess::signal_process;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// zstd compression level for archives
const DEFAULT_LEVEL: i32 = 3;

/// Creates `.tar.zst` archives with the system `tar` and in-process zstd.
#[derive(Clone, Debug)]
pub struct TarZstdArchiver {
    level: i32,
    timeout: Duration,
}

impl Default for TarZstdArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl TarZstdArchiver {
    pub fn new() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            timeout: crate::env::archive_timeout(),
        }
    }

    /// Set the zstd compression level (1-22, default 3).
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Set the create/verify timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `f` on the blocking pool. On timeout the `tar` child it spawned is
    /// killed.
    async fn blocking<T, F>(&self, description: &str, f: F) -> Result<T, ArchiveError>
    where
        T: Send + 'static,
        F: FnOnce(TarSlot) -> Result<T, ArchiveError> + Send + 'static,
    {
        let slot = TarSlot::default();
        let task = tokio::task::spawn_blocking({
            let slot = Arc::clone(&slot);
            move || f(slot)
        });
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ArchiveError::CommandFailed(format!(
                "{description} task failed: {join}"
            ))),
            Err(_) => {
                let pid = {
                    let mut state = slot.lock();
                    state.abandoned = true;
                    state.pid.take()
                };
                if let Some(pid) = pid {
                    tracing::warn!(pid, "{} timed out, killing tar", description);
                    signal_process(pid, "KILL").await;
                }
                Err(ArchiveError::CommandFailed(format!(
                    "{} timed out after {}s",
                    description,
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

#[async_trait]
impl ArchiveAdapter for TarZstdArchiver {
    async fn create(&self, source: &Path, dest: &Path) -> Result<u64, ArchiveError> {
        let source = source.to_owned();
        let dest = dest.to_owned();
        let level = self.level;
        self.blocking("tar create", move |slot| {
            create_blocking(&source, &dest, level, slot)
        })
        .await
    }

    async fn verify(&self, path: &Path) -> Result<(), ArchiveError> {
        let path = path.to_owned();
        self.blocking("tar verify", move |slot| verify_blocking(&path, slot))
            .await
    }

    async fn delete(&self, path: &Path) -> Result<(), ArchiveError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Bytes of tar's stderr kept for error messages.
const STDERR_TAIL: usize = 4096;

/// The `tar` process of one blocking task, shared with the timeout path.
#[derive(Debug, Default)]
struct TarState {
    pid: Option<u32>,
    /// Set once the caller gave up; a later spawn is killed immediately.
    abandoned: bool,
}

type TarSlot = Arc<Mutex<TarState>>;

/// A running `tar` whose stderr is drained on its own thread.
///
/// Dropped without [`TarChild::finish`], the process is killed and reaped.
struct TarChild {
    child: Option<Child>,
    slot: TarSlot,
    stderr: Option<JoinHandle<String>>,
}

impl TarChild {
    fn spawn(cmd: &mut Command, slot: TarSlot) -> Result<Self, ArchiveError> {
        let mut child = cmd
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ArchiveError::CommandFailed(format!("tar spawn failed: {e}")))?;
        let abandoned = {
            let mut state = slot.lock();
            if !state.abandoned {
                state.pid = Some(child.id());
            }
            state.abandoned
        };
        let stderr = child.stderr.take().map(drain_stderr);
        let tar = Self {
            child: Some(child),
            slot,
            stderr,
        };
        if abandoned {
            return Err(ArchiveError::CommandFailed(
                "tar abandoned after timeout".to_string(),
            ));
        }
        Ok(tar)
    }

    fn stdout(&mut self) -> io::Result<ChildStdout> {
        self.child
            .as_mut()
            .and_then(|c| c.stdout.take())
            .ok_or_else(|| io::Error::other("tar stdout not captured"))
    }

    fn stdin(&mut self) -> io::Result<ChildStdin> {
        self.child
            .as_mut()
            .and_then(|c| c.stdin.take())
            .ok_or_else(|| io::Error::other("tar stdin not captured"))
    }

    /// Wait for exit. Returns the status and the tail of stderr.
    fn finish(mut self) -> io::Result<(ExitStatus, String)> {
        let Some(mut child) = self.child.take() else {
            return Err(io::Error::other("tar already reaped"));
        };
        let status = child.wait();
        self.slot.lock().pid = None;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        Ok((status?, stderr))
    }
}

impl Drop for TarChild {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            self.slot.lock().pid = None;
        }
    }
}

/// Read `stderr` to EOF, keeping the last [`STDERR_TAIL`] bytes.
fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut tail = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match stderr.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend_from_slice(&buf[..n]);
                    if tail.len() > STDERR_TAIL {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}

fn create_blocking(
    source: &Path,
    dest: &Path,
    level: i32,
    slot: TarSlot,
) -> Result<u64, ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source directory does not exist: {}", source.display()),
        )));
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cmd = Command::new("tar");
    cmd.arg("-cf")
        .arg("-")
        .arg("-C")
        .arg(source)
        .arg(".")
        .stdin(Stdio::null())
        .stdout(Stdio::piped());
    let mut tar = TarChild::spawn(&mut cmd, slot)?;

    let file = File::create(dest)?;
    {
        let mut stdout = tar.stdout()?;
        let mut writer = BufWriter::new(&file);
        zstd::stream::copy_encode(&mut stdout, &mut writer, level)?;
        writer.flush()?;
    }

    let (status, stderr) = tar.finish()?;
    if !status.success() {
        return Err(ArchiveError::CommandFailed(format!(
            "tar exited with {}: {}",
            status,
            stderr.trim()
        )));
    }

    file.sync_all()?;
    Ok(file.metadata()?.len())
}

fn verify_blocking(path: &Path, slot: TarSlot) -> Result<(), ArchiveError> {
    let corrupt = |reason: String| ArchiveError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path)?;
    let mut decoder =
        zstd::stream::read::Decoder::new(file).map_err(|e| corrupt(e.to_string()))?;

    let mut cmd = Command::new("tar");
    cmd.arg("-tf")
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::null());
    let mut tar = TarChild::spawn(&mut cmd, slot)?;

    let fed = {
        let mut stdin = tar.stdin()?;
        io::copy(&mut decoder, &mut stdin).map(|_| ())
    };

    let (status, stderr) = tar.finish()?;
    fed.map_err(|e| corrupt(e.to_string()))?;
    if !status.success() {
        return Err(corrupt(stderr.trim().to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tar_tests.rs"]
mod tests;
