//! Daemon lifecycle specs
//!
//! Start the scheduler in the background, let it rotate a few generations,
//! then stop it with SIGTERM.

use crate::prelude::*;
use serial_test::serial;

fn archive_project() -> Project {
    let project = Project::with_config(ARCHIVE_JOB);
    project.file("out/.keep", "");
    project
}

fn newest_seq(project: &Project) -> u64 {
    let out = project
        .rollcron()
        .args(&["generations", "backup", "-o", "json"])
        .passes()
        .stdout();
    let gens: serde_json::Value = serde_json::from_str(&out).unwrap();
    gens.as_array()
        .and_then(|g| g.last())
        .and_then(|g| g["seq"].as_u64())
        .unwrap_or(0)
}

#[test]
#[serial]
fn daemon_runs_schedule_and_keeps_retention() {
    let mut project = archive_project();
    project.start_daemon();

    let rotated = wait_for(SPEC_WAIT_MAX_MS, || newest_seq(&project) >= 3);
    assert!(rotated, "daemon log:\n{}", project.daemon_log());

    assert_eq!(project.stop_daemon(), Some(0));
    assert_eq!(project.archives("backup").len(), 2);
    let log = project.daemon_log();
    assert!(log.contains("--- rollcron: starting (pid: "));
    assert!(log.contains("Received SIGTERM"));
}

#[test]
#[serial]
fn second_daemon_on_same_state_dir_is_refused() {
    let mut project = archive_project();
    project.start_daemon();
    let pid_file = project.state_path().join("daemon.pid");
    assert!(wait_for(SPEC_WAIT_MAX_MS, || std::fs::read_to_string(&pid_file)
        .is_ok_and(|s| !s.trim().is_empty())));

    project
        .rollcron()
        .args(&["start"])
        .fails()
        .stderr_has("rollcron is already running");
    project
        .rollcron()
        .args(&["run", "backup"])
        .fails()
        .stderr_has("rollcron is already running");

    assert_eq!(project.stop_daemon(), Some(0));
}

#[test]
#[serial]
fn daemon_with_invalid_config_exits_with_error() {
    let project = Project::with_config("[jobs.backup]\nschedule = \"soon\"\ncommand = \"true\"\n");

    project
        .rollcron()
        .args(&["start"])
        .fails()
        .stderr_has("invalid schedule for jobs.backup");

    assert!(project.daemon_log().contains("ERROR Failed to start daemon"));
}
