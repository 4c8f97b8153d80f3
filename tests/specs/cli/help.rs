//! CLI help and version specs

use crate::prelude::*;

#[test]
fn version_prints_package_version() {
    cli()
        .args(&["--version"])
        .passes()
        .stdout_has(concat!("rollcron ", env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_lists_subcommands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("start")
        .stdout_has("check")
        .stdout_has("run")
        .stdout_has("generations");
}

#[test]
fn missing_subcommand_is_an_error() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn run_requires_job_name() {
    cli().args(&["run"]).fails().stderr_has("<JOB>");
}
