//! `rollcron check` specs

use crate::prelude::*;

const TWO_JOBS: &str = r#"
[jobs.backup]
schedule = "60s"
command = "true"
output_dir = "out"

[jobs.report]
schedule = "@daily"
command = ["echo", "report"]
snapshot = "none"
enabled = false
"#;

#[test]
fn check_prints_next_due_per_job() {
    let project = Project::with_config(TWO_JOBS);

    let run = project
        .rollcron()
        .args(&["check"])
        .passes()
        .stdout_has("backup")
        .stdout_has("every")
        .stdout_has("report")
        .stdout_has("disabled")
        .stdout_has("2 job(s) ok");

    // Interval due times land on whole minutes.
    let backup = run
        .stdout()
        .lines()
        .find(|l| l.starts_with("backup"))
        .unwrap()
        .to_string();
    assert!(backup.ends_with(":00Z"), "unexpected line: {backup}");
}

#[test]
fn check_json_output() {
    let project = Project::with_config(TWO_JOBS);

    let out = project.rollcron().args(&["check", "-o", "json"]).passes().stdout();
    let rows: serde_json::Value = serde_json::from_str(&out).unwrap();

    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["job"], "backup");
    assert!(rows[0]["next_due"].is_string());
    assert_eq!(rows[1]["enabled"], false);
    assert!(rows[1]["next_due"].is_null());
}

#[test]
fn check_with_explicit_config_path() {
    let project = Project::empty();
    project.file("conf/jobs.toml", TWO_JOBS);

    project
        .rollcron()
        .args(&["--config", "conf/jobs.toml", "check"])
        .passes()
        .stdout_has("2 job(s) ok");
}

#[test]
fn check_reports_invalid_schedule_location() {
    let project = Project::with_config(
        r#"
[jobs.backup]
schedule = "every now and then"
command = "true"
output_dir = "out"
"#,
    );

    project
        .rollcron()
        .args(&["check"])
        .fails()
        .stderr_has("backup");
}

#[test]
fn check_requires_output_dir_for_snapshots() {
    let project = Project::with_config(
        r#"
[jobs.backup]
schedule = "60s"
command = "true"
"#,
    );

    project
        .rollcron()
        .args(&["check"])
        .fails()
        .stderr_has("jobs.backup.output_dir");
}

#[test]
fn check_missing_config_fails() {
    let project = Project::empty();

    project
        .rollcron()
        .args(&["check"])
        .fails()
        .stderr_has("rollcron.toml");
}
