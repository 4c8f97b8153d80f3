// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw configuration file structure, as deserialized from TOML

use indexmap::IndexMap;
use rollcron_core::{ConcurrencyPolicy, JobCommand, SnapshotMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub runner: RunnerDef,
    /// Jobs in file order
    #[serde(default, alias = "job")]
    pub jobs: IndexMap<String, JobDef>,
}

/// `[runner]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerDef {
    /// Worker pool size
    #[serde(default)]
    pub workers: Option<usize>,
    /// Duration string, e.g. "30s"
    #[serde(default)]
    pub shutdown_grace: Option<String>,
    /// SIGTERM to SIGKILL grace, e.g. "5s"
    #[serde(default)]
    pub kill_grace: Option<String>,
    /// Bytes captured per output stream
    #[serde(default)]
    pub max_output: Option<usize>,
}

/// `[jobs.<name>]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDef {
    /// Interval ("60s"), five-field cron expression, or a macro (`@daily`)
    pub schedule: String,
    /// RFC 3339 timestamp that interval due times are aligned to
    #[serde(default)]
    pub anchor: Option<String>,
    /// IANA time zone for calendar schedules ("Europe/Berlin"); UTC if unset
    #[serde(default)]
    pub timezone: Option<String>,
    /// Shell string or argv array
    pub command: JobCommand,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    #[serde(default)]
    pub snapshot: Option<SnapshotMode>,
    #[serde(default)]
    pub concurrency: Option<ConcurrencyPolicy>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub retention: RetentionDef,
    #[serde(default)]
    pub retry: Option<RetryDef>,
    /// Upper bound of the random delay before each run
    #[serde(default)]
    pub jitter: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionDef {
    #[serde(default)]
    pub keep_last: Option<usize>,
    /// Duration string, e.g. "7d"
    #[serde(default)]
    pub keep_within: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryDef {
    /// Extra attempts after the first failure
    #[serde(default)]
    pub max: u32,
    #[serde(default)]
    pub delay: Option<String>,
    #[serde(default)]
    pub jitter: Option<String>,
}
