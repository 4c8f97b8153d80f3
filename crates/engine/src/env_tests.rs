// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for env file parsing and loading

use super::*;
use rollcron_core::test_support::interval_job;
use tempfile::TempDir;

#[test]
fn parse_env_empty_input() {
    assert!(parse_env("").is_empty());
}

#[test]
fn parse_env_comments_and_blank_lines() {
    let content = "# comment\n\n# another comment\n";
    assert!(parse_env(content).is_empty());
}

#[test]
fn parse_env_value_with_equals() {
    let map = parse_env("API_KEY=abc=def=123\n");
    assert_eq!(map.get("API_KEY"), Some(&"abc=def=123".to_string()));
}

#[test]
fn parse_env_skips_lines_without_equals() {
    let map = parse_env("FOO=bar\nINVALID_LINE\nBAZ=qux\n");
    assert_eq!(map.len(), 2);
}

#[yare::parameterized(
    plain         = { "K=value",        "value" },
    double_quoted = { "K=\"a b\"",      "a b" },
    single_quoted = { "K='a b'",        "a b" },
    mismatched    = { "K=\"a b'",       "\"a b'" },
    lone_quote    = { "K=\"",           "\"" },
    export_prefix = { "export K=v",     "v" },
    padded        = { "  K  =  v  ",    "v" },
    empty         = { "K=",             "" },
)]
fn parse_env_values(line: &str, expected: &str) {
    let map = parse_env(line);
    assert_eq!(map.get("K").map(String::as_str), Some(expected));
}

#[test]
fn read_env_file_missing_returns_empty() {
    let dir = TempDir::new().unwrap();
    let map = read_env_file(&dir.path().join("nope")).unwrap();
    assert!(map.is_empty());
}

#[test]
fn job_env_overrides_dotenv() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".env"), "A=from-file\nB=from-file\n").unwrap();

    let mut job = interval_job("j", 60, "true");
    job.working_dir = dir.path().to_path_buf();
    job.env.insert("B".to_string(), "explicit".to_string());

    let env = job_env(&job);
    assert_eq!(
        env,
        vec![
            ("A".to_string(), "from-file".to_string()),
            ("B".to_string(), "explicit".to_string()),
        ]
    );
}

#[test]
fn job_env_without_dotenv_uses_explicit_only() {
    let dir = TempDir::new().unwrap();
    let mut job = interval_job("j", 60, "true");
    job.working_dir = dir.path().to_path_buf();
    job.env.insert("X".to_string(), "1".to_string());
    assert_eq!(job_env(&job), vec![("X".to_string(), "1".to_string())]);
}
