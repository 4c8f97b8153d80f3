// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job environment: dotenv file in the working directory plus explicit `env`.

use rollcron_core::Job;
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the dotenv file looked up in a job's working directory.
pub const ENV_FILE_NAME: &str = ".env";

/// Parse a dotenv-style file into ordered key-value pairs.
/// Returns an empty map if the file doesn't exist.
pub fn read_env_file(path: &Path) -> std::io::Result<BTreeMap<String, String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e),
    };
    Ok(parse_env(&content))
}

/// Parse dotenv content string into key-value pairs.
///
/// Accepts an optional `export ` prefix and strips one level of matching
/// single or double quotes around the value.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        if let Some((key, value)) = trimmed.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                map.insert(key.to_string(), unquote(value.trim()).to_string());
            }
        }
    }
    map
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Environment for a job's command: `.env` from the working directory first,
/// then the job's explicit `env` on top.
///
/// An unreadable `.env` is logged and ignored.
pub fn job_env(job: &Job) -> Vec<(String, String)> {
    let mut merged = BTreeMap::new();

    let path = job.working_dir.join(ENV_FILE_NAME);
    match read_env_file(&path) {
        Ok(vars) => merged.extend(vars),
        Err(e) => tracing::warn!(
            job = %job.name,
            path = %path.display(),
            error = %e,
            "failed to read env file"
        ),
    }

    merged.extend(job.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.into_iter().collect()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
