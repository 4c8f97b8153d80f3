// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: lock, logging, signal loop, reload.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use rollcron_adapters::{GitAdapter, TarZstdArchiver, TracedArchive, TracedVcs};
use rollcron_config::{load_config, ConfigError, RunnerSettings};
use rollcron_core::{SystemClock, UuidIdGen};
use rollcron_engine::{
    EngineError, ExecutorConfig, JobSet, JobSetDiff, Runtime, RuntimeConfig, RuntimeDeps,
};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Daemon runtime with concrete adapter types (wrapped with tracing)
pub type DaemonRuntime =
    Runtime<TracedVcs<GitAdapter>, TracedArchive<TarZstdArchiver>, SystemClock, UuidIdGen>;

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- rollcron: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- rollcron: starting (pid: ";

/// Size at which `daemon.log` is rotated on startup.
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated logs kept next to the live one (`daemon.log.1` .. `.3`).
const MAX_ROTATIONS: u32 = 3;

/// Files the daemon owns under its state directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root state directory (e.g. ~/.local/state/rollcron)
    pub state_dir: PathBuf,
    /// Lock file holding the daemon pid
    pub lock_path: PathBuf,
    /// Daemon log file
    pub log_path: PathBuf,
}

impl Paths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to set up logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Take the exclusive state-dir lock and record our pid in it.
///
/// The returned file must be kept alive; the lock is released on drop.
pub fn acquire_lock(paths: &Paths) -> Result<File, LifecycleError> {
    use std::io::Write;

    std::fs::create_dir_all(&paths.state_dir)?;

    // Open without truncating: the pid belongs to the holder until we lock.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

/// Pid recorded by the current lock holder, if readable.
pub fn lock_holder_pid(paths: &Paths) -> Option<u32> {
    std::fs::read_to_string(&paths.lock_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Append the startup marker to the log file.
pub fn write_startup_marker(paths: &Paths) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously; the non-blocking writer may not
/// flush before the process exits.
pub fn write_startup_error(paths: &Paths, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

/// Shift `daemon.log` to `daemon.log.1` (and older rotations up by one)
/// once it exceeds [`MAX_LOG_SIZE`]. The oldest rotation is dropped.
pub fn rotate_log_if_needed(path: &Path) {
    if let Err(e) = rollcron_storage::rotate_if_larger(path, MAX_LOG_SIZE, MAX_ROTATIONS) {
        eprintln!("warning: failed to rotate {}: {}", path.display(), e);
    }
}

/// Install the daemon subscriber: `RUST_LOG` filter (default `info`),
/// a non-blocking file layer on `daemon.log` and a stderr layer.
pub fn setup_logging(
    paths: &Paths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = paths.log_path.parent().ok_or(LifecycleError::NoStateDir)?;
    let file_name = paths
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoStateDir)?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| LifecycleError::Logging(e.to_string()))?;

    Ok(guard)
}

/// Stderr-only subscriber for one-shot commands (default `warn`).
pub fn setup_cli_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Runtime configuration for `state_dir` with the `[runner]` settings applied.
pub fn runtime_config(state_dir: &Path, runner: &RunnerSettings) -> RuntimeConfig {
    RuntimeConfig {
        state_dir: state_dir.to_path_buf(),
        workers: runner.workers,
        executor: ExecutorConfig {
            max_output: runner.max_output,
            kill_grace: runner.kill_grace,
        },
    }
}

/// Build the production runtime: git and tar adapters, system clock.
pub fn build_runtime(
    paths: &Paths,
    runner: &RunnerSettings,
    jobs: JobSet,
) -> Result<Arc<DaemonRuntime>, LifecycleError> {
    let deps = RuntimeDeps {
        vcs: TracedVcs::new(GitAdapter::new()),
        archive: TracedArchive::new(TarZstdArchiver::new()),
        clock: SystemClock,
        ids: UuidIdGen,
    };
    Ok(Runtime::new(
        deps,
        runtime_config(&paths.state_dir, runner),
        jobs,
    )?)
}

/// A locked state directory with a loaded runtime.
pub struct Daemon {
    config_path: PathBuf,
    paths: Paths,
    runner: RunnerSettings,
    runtime: Arc<DaemonRuntime>,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl Daemon {
    /// Lock the state directory, load the config and open the runtime.
    ///
    /// The lock comes first so a second daemon fails before touching state.
    pub fn startup(config_path: impl Into<PathBuf>, paths: Paths) -> Result<Self, LifecycleError> {
        let config_path = config_path.into();
        let lock_file = acquire_lock(&paths)?;
        let config = load_config(&config_path)?;
        let runtime = build_runtime(&paths, &config.runner, JobSet::new(config.jobs))?;

        info!(
            config = %config_path.display(),
            state_dir = %paths.state_dir.display(),
            jobs = runtime.jobs().len(),
            "daemon state opened"
        );

        Ok(Self {
            config_path,
            paths,
            runner: config.runner,
            runtime,
            lock_file,
        })
    }

    pub fn runtime(&self) -> &Arc<DaemonRuntime> {
        &self.runtime
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Re-read the config file and swap in its job set.
    ///
    /// On error the running job set is untouched. `[runner]` changes only
    /// take effect on restart.
    pub fn reload(&self) -> Result<JobSetDiff, LifecycleError> {
        let config = load_config(&self.config_path)?;
        if config.runner != self.runner {
            warn!("[runner] settings changed; restart the daemon to apply them");
        }
        Ok(self.runtime.reload(JobSet::new(config.jobs)))
    }

    /// Run the scheduler until SIGTERM or SIGINT; SIGHUP reloads.
    pub async fn serve(self) -> Result<(), LifecycleError> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;

        self.runtime.start().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = tokio::spawn({
            let runtime = Arc::clone(&self.runtime);
            async move { runtime.run_loop(shutdown_rx).await }
        });

        info!(pid = std::process::id(), "daemon ready");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down...");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading config");
                    match self.reload() {
                        Ok(diff) => info!(
                            added = diff.added.len(),
                            removed = diff.removed.len(),
                            changed = diff.changed.len(),
                            "config reloaded"
                        ),
                        Err(e) => error!(error = %e, "reload failed, keeping previous job set"),
                    }
                }
            }
        }

        shutdown_tx.send_replace(true);
        if let Err(e) = scheduler.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
        self.runtime.shutdown(self.runner.shutdown_grace).await;
        info!("Daemon stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
