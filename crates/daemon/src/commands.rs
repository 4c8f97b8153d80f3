// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot commands: `check`, `run` and `generations`.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use rollcron_adapters::{ArchiveAdapter, VcsAdapter};
use rollcron_config::Config;
use rollcron_core::{Artifact, Clock, Generation, IdGen, JobName, Run};
use rollcron_engine::{log_paths, EngineError, Runtime};
use rollcron_storage::RegistryStore;
use serde::Serialize;

use crate::lifecycle::LifecycleError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One row of `rollcron check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobCheck {
    pub job: JobName,
    pub schedule: String,
    pub enabled: bool,
    pub next_due: Option<DateTime<Utc>>,
}

/// Next due time of every job in `config`, as of `now`.
pub fn check(config: &Config, now: DateTime<Utc>) -> Vec<JobCheck> {
    config
        .jobs
        .iter()
        .map(|job| JobCheck {
            job: job.name.clone(),
            schedule: job.schedule.to_string(),
            enabled: job.enabled,
            next_due: job.schedule.first_due(now).filter(|_| job.enabled),
        })
        .collect()
}

pub fn format_check(rows: &[JobCheck]) -> String {
    let width = rows
        .iter()
        .map(|r| r.job.as_str().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for row in rows {
        let next = match (row.enabled, row.next_due) {
            (false, _) => "disabled".to_string(),
            (true, Some(at)) => at.to_rfc3339_opts(SecondsFormat::Secs, true),
            (true, None) => "never".to_string(),
        };
        out.push_str(&format!(
            "{:<width$}  {:<16}  {}\n",
            row.job.as_str(),
            row.schedule,
            next
        ));
    }
    out
}

/// Recorded generations of `job`, read from the registry under `state_dir`.
pub fn generations(state_dir: &Path, job: &JobName) -> Result<Vec<Generation>, LifecycleError> {
    let store =
        RegistryStore::open(log_paths::registry_path(state_dir)).map_err(EngineError::from)?;
    Ok(store.read(|r| r.generations(job).to_vec()))
}

pub fn format_generations(job: &JobName, generations: &[Generation]) -> String {
    if generations.is_empty() {
        return format!("no generations for {}\n", job);
    }
    let mut out = String::new();
    for generation in generations {
        let artifact = match &generation.artifact {
            Artifact::Archive { path } => path.display().to_string(),
            Artifact::Commit { id, tag: Some(tag) } => format!("{} ({})", short(id), tag),
            Artifact::Commit { id, tag: None } => short(id).to_string(),
        };
        out.push_str(&format!(
            "{:>5}  {}  {}{}\n",
            generation.seq,
            generation
                .created_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            artifact,
            if generation.unchanged {
                "  unchanged"
            } else {
                ""
            },
        ));
    }
    out
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Result of `rollcron run <job>`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: Option<Run>,
    /// Generation created by this run, if any.
    pub generation: Option<Generation>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.run.as_ref().is_some_and(Run::is_success)
    }
}

/// Recover and prune the runtime's jobs, then run `job` once through the
/// full pipeline. Callers build the runtime with just that job.
pub async fn run_once<V, A, C, G>(
    runtime: &Arc<Runtime<V, A, C, G>>,
    job: &JobName,
) -> Result<RunReport, EngineError>
where
    V: VcsAdapter,
    A: ArchiveAdapter,
    C: Clock,
    G: IdGen,
{
    runtime.start().await;
    let before = runtime.generations(job).last().map(|g| g.seq);
    let run = runtime.run_job_now(job.as_str()).await?;
    let generation = runtime
        .generations(job)
        .last()
        .filter(|g| Some(g.seq) != before)
        .cloned();
    Ok(RunReport { run, generation })
}

pub fn format_run(report: &RunReport) -> String {
    let Some(run) = &report.run else {
        return "run cancelled before it started\n".to_string();
    };
    let mut out = format!(
        "{} {} attempt={} {} ({}ms)\n",
        run.job,
        run.id,
        run.attempt,
        run.outcome,
        run.duration_ms()
    );
    if let Some(generation) = &report.generation {
        out.push_str(&format!("generation {}\n", generation.seq));
    }
    out
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
