// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn populated_dir() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("dump.sql"), "select 1;\n".repeat(100)).unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested/extra.txt"), "x").unwrap();
    dir
}

#[tokio::test]
async fn create_then_verify() {
    let source = populated_dir();
    let out = tempdir().unwrap();
    let dest = out.path().join("db-000001.tar.zst");
    let archiver = TarZstdArchiver::new();

    let size = archiver.create(source.path(), &dest).await.unwrap();
    assert!(size > 0);
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), size);
    archiver.verify(&dest).await.unwrap();
}

#[tokio::test]
async fn archive_lists_source_files() {
    let source = populated_dir();
    let out = tempdir().unwrap();
    let dest = out.path().join("a.tar.zst");
    TarZstdArchiver::new()
        .with_level(1)
        .create(source.path(), &dest)
        .await
        .unwrap();

    let bytes = zstd::decode_all(File::open(&dest).unwrap()).unwrap();
    let listing = String::from_utf8_lossy(&bytes);
    assert!(listing.contains("dump.sql"));
    assert!(listing.contains("nested/extra.txt"));
}

#[tokio::test]
async fn verify_rejects_garbage() {
    let out = tempdir().unwrap();
    let path = out.path().join("bad.tar.zst");
    std::fs::write(&path, b"definitely not zstd").unwrap();

    let err = TarZstdArchiver::new().verify(&path).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Corrupt { .. }), "got {err:?}");
}

#[tokio::test]
async fn verify_rejects_truncated_archive() {
    let source = populated_dir();
    let out = tempdir().unwrap();
    let dest = out.path().join("a.tar.zst");
    let archiver = TarZstdArchiver::new();
    archiver.create(source.path(), &dest).await.unwrap();

    let bytes = std::fs::read(&dest).unwrap();
    std::fs::write(&dest, &bytes[..bytes.len() / 2]).unwrap();

    assert!(archiver.verify(&dest).await.is_err());
}

#[tokio::test]
async fn create_fails_for_missing_source() {
    let out = tempdir().unwrap();
    let result = TarZstdArchiver::new()
        .create(&out.path().join("missing"), &out.path().join("x.tar.zst"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let out = tempdir().unwrap();
    let path = out.path().join("a.tar.zst");
    std::fs::write(&path, b"x").unwrap();

    let archiver = TarZstdArchiver::new();
    archiver.delete(&path).await.unwrap();
    assert!(!path.exists());
    archiver.delete(&path).await.unwrap();
}

#[tokio::test]
async fn noisy_tar_stderr_does_not_stall_create() {
    // Every socket makes tar print a warning; together they overflow the
    // stderr pipe buffer.
    let source = tempdir().unwrap();
    for i in 0..4000 {
        let path = source.path().join(format!("s{i:04}"));
        drop(std::os::unix::net::UnixListener::bind(path).unwrap());
    }
    std::fs::write(source.path().join("data.txt"), "kept").unwrap();
    let out = tempdir().unwrap();
    let dest = out.path().join("a.tar.zst");
    let archiver = TarZstdArchiver::new().with_timeout(Duration::from_secs(120));

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        archiver.create(source.path(), &dest),
    )
    .await
    .expect("tar create stalled");

    if let Err(e) = result {
        assert!(!e.to_string().contains("timed out"), "got {e}");
    }
}

fn process_exists(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[test]
fn dropped_child_is_killed_and_reaped() {
    let slot = TarSlot::default();
    let mut cmd = Command::new("sleep");
    cmd.arg("30").stdin(Stdio::null()).stdout(Stdio::null());
    let child = TarChild::spawn(&mut cmd, Arc::clone(&slot)).unwrap();
    let pid = slot.lock().pid.unwrap();
    assert!(process_exists(pid));

    drop(child);

    assert!(slot.lock().pid.is_none());
    assert!(!process_exists(pid));
}

#[test]
fn spawn_after_timeout_is_refused() {
    let slot = TarSlot::default();
    slot.lock().abandoned = true;
    let mut cmd = Command::new("sleep");
    cmd.arg("30").stdin(Stdio::null()).stdout(Stdio::null());

    let result = TarChild::spawn(&mut cmd, Arc::clone(&slot));

    assert!(matches!(result, Err(ArchiveError::CommandFailed(_))));
    assert!(slot.lock().pid.is_none());
}

#[test]
fn finish_reports_stderr_tail() {
    let slot = TarSlot::default();
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo broken >&2; exit 2"])
        .stdin(Stdio::null())
        .stdout(Stdio::null());
    let child = TarChild::spawn(&mut cmd, slot).unwrap();

    let (status, stderr) = child.finish().unwrap();

    assert_eq!(status.code(), Some(2));
    assert_eq!(stderr.trim(), "broken");
}
