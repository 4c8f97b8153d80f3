// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable whole-file replacement.
//!
//! ```text
//! write .tmp ─→ fsync .tmp ─→ rename → target ─→ fsync directory
//! ```
//!
//! A crash at any point leaves either the old file or the new one in place,
//! never a torn write. The [`StateWriter`] trait routes every step through an
//! injectable implementation so tests can fail any one of them.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File operations used by [`write_atomic`].
pub trait StateWriter: Send + Sync + 'static {
    /// Write data to a temporary file, creating parent directories.
    fn write_tmp(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Fsync a file to ensure data is durable.
    fn fsync_file(&self, path: &Path) -> io::Result<()>;

    /// Atomically rename tmp file to final path.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Fsync directory to make rename durable.
    fn fsync_dir(&self, path: &Path) -> io::Result<()>;
}

/// Production writer using real filesystem operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStateWriter;

impl StateWriter for FsStateWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(data)
    }

    fn fsync_file(&self, path: &Path) -> io::Result<()> {
        File::open(path)?.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn fsync_dir(&self, path: &Path) -> io::Result<()> {
        File::open(path)?.sync_all()
    }
}

/// Replace `path` with `data` durably.
///
/// On failure the temporary file is removed (best effort) and `path` keeps
/// its previous contents.
pub fn write_atomic<W: StateWriter + ?Sized>(
    writer: &W,
    path: &Path,
    data: &[u8],
) -> io::Result<()> {
    let tmp_path = tmp_path_for(path);
    let result: io::Result<()> = (|| {
        writer.write_tmp(&tmp_path, data)?;
        writer.fsync_file(&tmp_path)?;
        writer.rename(&tmp_path, path)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            writer.fsync_dir(parent)?;
        }
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// `registry.json` → `registry.json.tmp`
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

/// `daemon.log` → `daemon.log.<n>`
pub fn numbered_path(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Shift `path` to `path.1` (and older rotations up by one) once it grows
/// past `max_size` bytes. Keeps `keep` rotations; the oldest is dropped.
///
/// Returns whether the file was rotated.
pub fn rotate_if_larger(path: &Path, max_size: u64, keep: u32) -> io::Result<bool> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if len <= max_size || keep == 0 {
        return Ok(false);
    }

    let _ = fs::remove_file(numbered_path(path, keep));
    for n in (1..keep).rev() {
        let from = numbered_path(path, n);
        if from.exists() {
            fs::rename(&from, numbered_path(path, n + 1))?;
        }
    }
    fs::rename(path, numbered_path(path, 1))?;
    Ok(true)
}

#[cfg(test)]
#[path = "state_file_tests.rs"]
mod tests;
