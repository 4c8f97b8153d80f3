// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration parsing and validation

use crate::def::{ConfigFile, JobDef, RetryDef, RunnerDef};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rollcron_core::{
    is_valid_job_name, parse_duration, Job, JobCommand, RetentionPolicy, RetryConfig, Schedule,
    ScheduleError, SnapshotMode,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_MAX_OUTPUT: usize = 64 * 1024;

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {location}: {message}")]
    Invalid { location: String, message: String },

    #[error("invalid schedule for jobs.{job}: {source}")]
    Schedule {
        job: String,
        #[source]
        source: ScheduleError,
    },
}

fn invalid(location: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        location: location.into(),
        message: message.into(),
    }
}

/// Validated `[runner]` settings with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    pub workers: usize,
    pub shutdown_grace: Duration,
    pub kill_grace: Duration,
    pub max_output: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            kill_grace: DEFAULT_KILL_GRACE,
            max_output: DEFAULT_MAX_OUTPUT,
        }
    }
}

/// A validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub runner: RunnerSettings,
    /// Jobs in file order
    pub jobs: Vec<Job>,
}

/// Read and validate the configuration at `path`.
///
/// Relative paths inside the file resolve against the file's directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let base_dir = std::fs::canonicalize(&base_dir).unwrap_or(base_dir);
    parse_config(&content, &base_dir)
}

/// Parse and validate configuration content.
pub fn parse_config(content: &str, base_dir: &Path) -> Result<Config, ConfigError> {
    // 1. Serde does the heavy lifting
    let file: ConfigFile = toml::from_str(content)?;

    // 2. Runner settings
    let runner = runner_settings(&file.runner)?;

    // 3. Jobs, validated one by one in file order
    let jobs = file
        .jobs
        .iter()
        .map(|(name, def)| build_job(name, def, base_dir))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Config { runner, jobs })
}

fn runner_settings(def: &RunnerDef) -> Result<RunnerSettings, ConfigError> {
    let defaults = RunnerSettings::default();
    let workers = def.workers.unwrap_or(defaults.workers);
    if workers == 0 {
        return Err(invalid("runner.workers", "must be at least 1"));
    }
    Ok(RunnerSettings {
        workers,
        shutdown_grace: optional_duration(&def.shutdown_grace, "runner.shutdown_grace")?
            .unwrap_or(defaults.shutdown_grace),
        kill_grace: optional_duration(&def.kill_grace, "runner.kill_grace")?
            .unwrap_or(defaults.kill_grace),
        max_output: def.max_output.unwrap_or(defaults.max_output),
    })
}

fn build_job(name: &str, def: &JobDef, base_dir: &Path) -> Result<Job, ConfigError> {
    let location = format!("jobs.{name}");
    if !is_valid_job_name(name) {
        return Err(invalid(
            &location,
            "job names may only contain letters, digits, '-' and '_'",
        ));
    }

    let schedule = build_schedule(name, def)?;
    let command = validate_command(&def.command, &format!("{location}.command"))?;

    let snapshot = def.snapshot.unwrap_or_default();
    let output_dir = def.output_dir.as_deref().map(|p| resolve(base_dir, p));
    if snapshot != SnapshotMode::None && output_dir.is_none() {
        return Err(invalid(
            format!("{location}.output_dir"),
            format!("required when snapshot = \"{snapshot}\""),
        ));
    }

    if def.retention.keep_last == Some(0) {
        tracing::warn!(job = name, "retention.keep_last = 0 keeps the newest generation; using 1");
    }
    let retention = RetentionPolicy::new(
        def.retention.keep_last,
        optional_duration(
            &def.retention.keep_within,
            &format!("{location}.retention.keep_within"),
        )?,
    );

    let timeout = optional_duration(&def.timeout, &format!("{location}.timeout"))?;
    if timeout == Some(Duration::ZERO) {
        return Err(invalid(format!("{location}.timeout"), "must be greater than zero"));
    }

    let mut job = Job::builder(name, schedule, "")
        .command(command)
        .working_dir(
            def.working_dir
                .as_deref()
                .map_or_else(|| base_dir.to_path_buf(), |p| resolve(base_dir, p)),
        )
        .retention(retention)
        .concurrency(def.concurrency.unwrap_or_default())
        .snapshot(snapshot)
        .retry(retry_config(def.retry.as_ref(), &location)?)
        .enabled(def.enabled);
    if let Some(dir) = output_dir {
        job = job.output_dir(dir);
    }
    if let Some(dir) = &def.archive_dir {
        job = job.archive_dir(resolve(base_dir, dir));
    }
    if let Some(timeout) = timeout {
        job = job.timeout(timeout);
    }
    if let Some(jitter) = optional_duration(&def.jitter, &format!("{location}.jitter"))? {
        job = job.jitter(jitter);
    }
    for (key, value) in &def.env {
        job = job.env(key, value);
    }
    Ok(job.build())
}

fn build_schedule(name: &str, def: &JobDef) -> Result<Schedule, ConfigError> {
    let schedule = Schedule::parse(&def.schedule).map_err(|source| ConfigError::Schedule {
        job: name.to_string(),
        source,
    })?;
    let schedule = match &def.timezone {
        Some(tz) => {
            let location = format!("jobs.{name}.timezone");
            let tz: Tz = tz
                .parse()
                .map_err(|_| invalid(&location, format!("unknown time zone '{tz}'")))?;
            schedule
                .with_timezone(tz)
                .map_err(|e| invalid(location, e.to_string()))?
        }
        None => schedule,
    };
    let Some(anchor) = &def.anchor else {
        return Ok(schedule);
    };

    let location = format!("jobs.{name}.anchor");
    let anchor = DateTime::parse_from_rfc3339(anchor)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(&location, e.to_string()))?;
    match schedule {
        Schedule::Interval { every, .. } => {
            Schedule::every_from(every, anchor).map_err(|source| ConfigError::Schedule {
                job: name.to_string(),
                source,
            })
        }
        Schedule::Calendar(_) => Err(invalid(location, "only interval schedules take an anchor")),
    }
}

fn validate_command(command: &JobCommand, location: &str) -> Result<JobCommand, ConfigError> {
    let empty = match command {
        JobCommand::Shell(cmd) => cmd.trim().is_empty(),
        JobCommand::Argv(argv) => argv.first().map_or(true, |p| p.trim().is_empty()),
    };
    if empty {
        return Err(invalid(location, "command is empty"));
    }
    Ok(command.clone())
}

fn retry_config(def: Option<&RetryDef>, location: &str) -> Result<RetryConfig, ConfigError> {
    let Some(def) = def else {
        return Ok(RetryConfig::default());
    };
    Ok(RetryConfig {
        max: def.max,
        delay: optional_duration(&def.delay, &format!("{location}.retry.delay"))?
            .unwrap_or_default(),
        jitter: optional_duration(&def.jitter, &format!("{location}.retry.jitter"))?
            .unwrap_or_default(),
    })
}

fn optional_duration(value: &Option<String>, location: &str) -> Result<Option<Duration>, ConfigError> {
    value
        .as_deref()
        .map(|s| parse_duration(s).map_err(|message| invalid(location, message)))
        .transpose()
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
