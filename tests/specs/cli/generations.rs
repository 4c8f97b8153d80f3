//! `rollcron generations <job>` specs

use crate::prelude::*;

const BACKUP: &str = r#"
[jobs.backup]
schedule = "1h"
command = "true"
output_dir = "out"
"#;

#[test]
fn generations_empty_state_dir() {
    let project = Project::with_config(BACKUP);

    project
        .rollcron()
        .args(&["generations", "backup"])
        .passes()
        .stdout_has("no generations for backup");
}

#[test]
fn generations_lists_runs_in_order() {
    let project = Project::with_config(BACKUP);
    project.file("out/data.txt", "x");
    project.rollcron().args(&["run", "backup"]).passes();
    project.rollcron().args(&["run", "backup"]).passes();

    let out = project
        .rollcron()
        .args(&["generations", "backup"])
        .passes()
        .stdout();

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2, "output: {out}");
    assert!(lines[0].trim_start().starts_with('1'));
    assert!(lines[0].ends_with("backup-000001.tar.zst"));
    assert!(lines[1].ends_with("backup-000002.tar.zst"));
}

#[test]
fn generations_json_output() {
    let project = Project::with_config(BACKUP);
    project.file("out/data.txt", "x");
    project.rollcron().args(&["run", "backup"]).passes();

    let out = project
        .rollcron()
        .args(&["generations", "backup", "--output", "json"])
        .passes()
        .stdout();
    let gens: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(gens[0]["seq"], 1);
    assert_eq!(gens[0]["job"], "backup");
}

#[test]
fn generations_state_dir_flag() {
    let project = Project::with_config(BACKUP);
    project.file("out/data.txt", "x");
    let other = tempfile::tempdir().unwrap();
    let other_path = other.path().to_string_lossy().into_owned();

    project
        .rollcron()
        .args(&["--state-dir", &other_path, "run", "backup"])
        .passes();

    project
        .rollcron()
        .args(&["generations", "backup"])
        .passes()
        .stdout_has("no generations for backup");
    project
        .rollcron()
        .args(&["--state-dir", &other_path, "generations", "backup"])
        .passes()
        .stdout_has("backup-000001.tar.zst");
}

#[test]
fn generations_rejects_invalid_name() {
    Project::with_config(BACKUP)
        .rollcron()
        .args(&["generations", "../etc"])
        .fails()
        .stderr_has("invalid job name");
}
