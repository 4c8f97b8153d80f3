//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for driving the `rollcron` binary.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 10_000;

/// Returns the path to a workspace binary, checking the llvm-cov target
/// directory first, then the standard one, then the directory of the test
/// binary itself.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Path to the `rollcron` binary, built once per test process.
///
/// The binary belongs to another workspace member, so `cargo test` on the
/// root package alone does not build it.
pub fn rollcron_binary() -> PathBuf {
    static BINARY: OnceLock<PathBuf> = OnceLock::new();
    BINARY
        .get_or_init(|| {
            let status = Command::new(option_env!("CARGO").unwrap_or("cargo"))
                .args(["build", "--quiet", "-p", "rollcron-daemon", "--bin", "rollcron"])
                .current_dir(env!("CARGO_MANIFEST_DIR"))
                .status();
            if !matches!(status, Ok(s) if s.success()) {
                eprintln!("warning: could not build rollcron, using existing binary");
            }
            binary_path("rollcron")
        })
        .clone()
}

/// Create a CLI builder for rollcron commands
pub fn cli() -> CliBuilder {
    CliBuilder {
        args: Vec::new(),
        dir: None,
        envs: Vec::new(),
    }
}

/// High-level CLI builder for fluent test assertions
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    /// Add CLI arguments
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set working directory
    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    /// Set environment variable
    pub fn env(mut self, key: &str, value: impl AsRef<Path>) -> Self {
        self.envs.push((
            key.to_string(),
            value.as_ref().to_string_lossy().to_string(),
        ));
        self
    }

    /// Build the command without running it
    pub fn command(self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::new(rollcron_binary());
        cmd.args(&self.args);
        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }
        // Keep the caller's state dir out of tests.
        cmd.env_remove("ROLLCRON_STATE_DIR");
        cmd.env_remove("RUST_LOG");
        for (key, value) in self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run and expect success (exit code 0)
    pub fn passes(self) -> RunAssert {
        let output = self.command().assert().success().get_output().clone();
        RunAssert { output }
    }

    /// Run and expect failure (non-zero exit code)
    pub fn fails(self) -> RunAssert {
        let output = self.command().assert().failure().get_output().clone();
        RunAssert { output }
    }
}

/// Result of a CLI run for chaining assertions
pub struct RunAssert {
    output: std::process::Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn code(&self) -> Option<i32> {
        self.output.status.code()
    }

    /// Assert stdout contains substring
    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    /// Assert stdout does not contain substring
    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            !stdout.contains(unexpected),
            "stdout should not contain '{}'\nstdout: {}",
            unexpected,
            stdout
        );
        self
    }

    /// Assert stderr contains substring
    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Poll a condition until it returns true or timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let poll_interval = std::time::Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

// =============================================================================
// Project
// =============================================================================

/// Temporary project directory holding a `rollcron.toml`, plus an isolated
/// state directory.
pub struct Project {
    dir: tempfile::TempDir,
    state_dir: tempfile::TempDir,
    daemon: Option<Child>,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            state_dir: tempfile::tempdir().unwrap(),
            daemon: None,
        }
    }

    /// Project with `content` as its `rollcron.toml`
    pub fn with_config(content: &str) -> Self {
        let project = Self::empty();
        project.file("rollcron.toml", content);
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file at the given path (parent directories created automatically)
    pub fn file(&self, path: impl AsRef<Path>, content: &str) {
        let full_path = self.dir.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full_path, content).unwrap();
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    /// Run rollcron in this project with its isolated state dir
    pub fn rollcron(&self) -> CliBuilder {
        cli()
            .pwd(self.path())
            .env("ROLLCRON_STATE_DIR", self.state_path())
    }

    /// Spawn `rollcron start` in the background.
    pub fn start_daemon(&mut self) {
        let child = Command::new(rollcron_binary())
            .arg("start")
            .current_dir(self.path())
            .env("ROLLCRON_STATE_DIR", self.state_path())
            .env_remove("RUST_LOG")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        self.daemon = Some(child);
    }

    /// Send SIGTERM to the daemon and wait for it to exit.
    pub fn stop_daemon(&mut self) -> Option<i32> {
        let mut child = self.daemon.take()?;
        Command::new("kill")
            .args(["-TERM", &child.id().to_string()])
            .status()
            .unwrap();
        child.wait().unwrap().code()
    }

    /// Read the daemon log file contents (for debugging test failures)
    pub fn daemon_log(&self) -> String {
        let log_path = self.state_path().join("daemon.log");
        std::fs::read_to_string(log_path).unwrap_or_else(|_| "(no daemon log)".to_string())
    }

    pub fn archive_dir(&self, job: &str) -> PathBuf {
        self.state_path().join("archives").join(job)
    }

    /// Archive file names of `job`, sorted
    pub fn archives(&self, job: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.archive_dir(job))
            .map(|d| {
                d.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Some(mut child) = self.daemon.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Archive job on a one-second interval writing into `out/`
pub const ARCHIVE_JOB: &str = r#"
[jobs.backup]
schedule = "1s"
command = "date +%s%N > out/stamp.txt"
output_dir = "out"
retention = { keep_last = 2 }
"#;
