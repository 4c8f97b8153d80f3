// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    exit    = { FailureReason::NonZeroExit { code: Some(3) }, "exit code 3", "exit" },
    signal  = { FailureReason::NonZeroExit { code: None }, "killed by signal", "exit" },
    timeout = { FailureReason::Timeout { after_ms: 2000 }, "timed out after 2000ms", "timeout" },
    spawn   = { FailureReason::Spawn { message: "no such file".into() }, "spawn failed: no such file", "spawn" },
)]
fn failure_reason_display(reason: FailureReason, text: &str, kind: &str) {
    assert_eq!(reason.to_string(), text);
    assert_eq!(reason.kind(), kind);
}

#[test]
fn outcome_serializes_with_status_tag() {
    let json = serde_json::to_value(RunOutcome::Failure(FailureReason::Timeout {
        after_ms: 5,
    }))
    .unwrap();
    assert_eq!(json["status"], "failure");
    assert_eq!(json["reason"], "timeout");
    assert_eq!(json["after_ms"], 5);

    let json = serde_json::to_string(&RunOutcome::Success).unwrap();
    assert_eq!(json, r#"{"status":"success"}"#);
}

#[test]
fn duration_is_never_negative() {
    let start = chrono::DateTime::UNIX_EPOCH + chrono::Duration::seconds(10);
    let run = Run {
        id: RunId::new("r"),
        job: JobName::new("j"),
        attempt: 1,
        started_at: start,
        finished_at: start - chrono::Duration::seconds(1),
        exit_code: Some(0),
        output: CapturedOutput::default(),
        outcome: RunOutcome::Success,
    };
    assert_eq!(run.duration_ms(), 0);
    assert!(run.is_success());
}
