//! `rollcron run <job>` specs

use crate::prelude::*;
use std::io::Read;

fn backup_project(command: &str) -> Project {
    let project = Project::with_config(&format!(
        r#"
[jobs.backup]
schedule = "1h"
command = "{command}"
output_dir = "out"
retention = {{ keep_last = 2 }}
"#
    ));
    project.file("out/data.txt", "hello from rollcron\n");
    project
}

#[test]
fn run_once_writes_a_readable_archive() {
    let project = backup_project("true");

    project
        .rollcron()
        .args(&["run", "backup"])
        .passes()
        .stdout_has("attempt=1 success")
        .stdout_has("generation 1");

    assert_eq!(project.archives("backup"), vec!["backup-000001.tar.zst"]);

    let file = std::fs::File::open(project.archive_dir("backup").join("backup-000001.tar.zst"))
        .unwrap();
    let mut tar = Vec::new();
    zstd::stream::read::Decoder::new(file)
        .unwrap()
        .read_to_end(&mut tar)
        .unwrap();
    let tar = String::from_utf8_lossy(&tar);
    assert!(tar.contains("data.txt"));
    assert!(tar.contains("hello from rollcron"));
}

#[test]
fn repeated_runs_rotate_old_archives() {
    let project = backup_project("true");

    for _ in 0..3 {
        project.rollcron().args(&["run", "backup"]).passes();
    }

    assert_eq!(
        project.archives("backup"),
        vec!["backup-000002.tar.zst", "backup-000003.tar.zst"]
    );
}

#[test]
fn failing_run_exits_nonzero_without_archive() {
    let project = backup_project("exit 4");

    let run = project.rollcron().args(&["run", "backup"]).fails();

    assert_eq!(run.code(), Some(1));
    assert!(run.stdout().contains("failure (exit code 4)"));
    assert!(project.archives("backup").is_empty());
}

#[test]
fn run_writes_job_log_and_audit() {
    let project = backup_project("echo snapshot-me");

    project.rollcron().args(&["run", "backup"]).passes();

    let log = std::fs::read_to_string(project.state_path().join("logs/backup.log")).unwrap();
    assert!(log.contains("[run]"));
    assert!(log.contains("snapshot-me"));

    let audit = std::fs::read_to_string(project.state_path().join("audit.jsonl")).unwrap();
    assert!(audit.contains("backup"));
    assert!(audit.lines().count() >= 3, "audit: {audit}");
}

#[test]
fn run_unknown_job_fails() {
    let project = backup_project("true");

    project
        .rollcron()
        .args(&["run", "missing"])
        .fails()
        .stderr_has("job not found: missing");
}
