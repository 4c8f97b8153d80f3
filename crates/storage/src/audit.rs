// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL audit log.
//!
//! Each entry is a single line of JSON: `{"seq":N,"at":"...","event":{...}}\n`

use chrono::{DateTime, Utc};
use rollcron_core::{Event, JobName};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialization helper for writing entries without cloning the event.
#[derive(Serialize)]
struct AuditRecordRef<'a> {
    seq: u64,
    at: DateTime<Utc>,
    event: &'a Event,
}

/// A single audit entry with sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: Event,
}

/// Size past which the log is rotated to `audit.jsonl.1`.
pub const MAX_AUDIT_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated audit files kept next to the live one.
pub const AUDIT_ROTATIONS: u32 = 3;

/// Writer side of the audit log.
pub struct AuditLog {
    file: File,
    path: PathBuf,
    /// Last sequence number written
    write_seq: u64,
    /// Bytes in the live file
    len: u64,
    max_size: u64,
}

impl AuditLog {
    /// Open or create the log, continuing its sequence.
    ///
    /// A corrupt tail (for example a line torn by a crash) is copied to
    /// `.bak` and truncated away; the valid prefix stays in place.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        Self::open_with_max_size(path, MAX_AUDIT_SIZE)
    }

    /// Open with a custom rotation threshold.
    pub fn open_with_max_size(path: &Path, max_size: u64) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = open_append(path)?;
        let scan = scan(&file, |_| ())?;
        if scan.is_torn() {
            let bak_path = crate::state_file::rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = scan.entries,
                dropped_bytes = scan.len - scan.valid_len,
                "Corrupt audit log tail, moving it to .bak",
            );
            save_tail(&file, scan.valid_len, &bak_path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        // A freshly rotated log continues the previous file's sequence.
        let mut write_seq = scan.max_seq;
        if scan.entries == 0 {
            write_seq = write_seq.max(rotated_max_seq(path)?);
        }

        let mut log = Self {
            file,
            path: path.to_owned(),
            write_seq,
            len: scan.valid_len,
            max_size,
        };
        if log.len > log.max_size {
            log.rotate()?;
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event and flush it. Returns the assigned sequence number.
    pub fn append(&mut self, event: &Event, at: DateTime<Utc>) -> Result<u64, AuditError> {
        let seq = self.write_seq + 1;
        let mut line = serde_json::to_vec(&AuditRecordRef { seq, at, event })?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.write_seq = seq;
        self.len += line.len() as u64;

        if self.len > self.max_size {
            if let Err(e) = self.rotate() {
                warn!(path = %self.path.display(), error = %e, "failed to rotate audit log");
            }
        }
        Ok(seq)
    }

    /// Last sequence number written.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    fn rotate(&mut self) -> Result<(), AuditError> {
        crate::state_file::rotate_if_larger(&self.path, self.max_size, AUDIT_ROTATIONS)?;
        self.file = open_append(&self.path)?;
        self.len = self.file.metadata()?.len();
        debug!(path = %self.path.display(), seq = self.write_seq, "audit log rotated");
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
}

/// Copy everything from `offset` to the end of `file` into `bak_path`.
fn save_tail(file: &File, offset: u64, bak_path: &Path) -> io::Result<()> {
    let mut src = file.try_clone()?;
    src.seek(SeekFrom::Start(offset))?;
    let mut bak = File::create(bak_path)?;
    io::copy(&mut src, &mut bak)?;
    bak.sync_all()
}

/// Highest sequence number in the newest rotated file, 0 if there is none.
fn rotated_max_seq(path: &Path) -> Result<u64, AuditError> {
    match File::open(crate::state_file::numbered_path(path, 1)) {
        Ok(file) => Ok(scan(&file, |_| ())?.max_seq),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
struct Scan {
    max_seq: u64,
    entries: u64,
    /// End of the last complete, parseable line.
    valid_len: u64,
    /// Bytes read in total.
    len: u64,
}

impl Scan {
    fn is_torn(&self) -> bool {
        self.valid_len < self.len
    }
}

/// Stream the log line by line, handing each entry to `visit`.
///
/// Stops at the first line that is unterminated, not UTF-8 or not an entry.
fn scan(file: &File, mut visit: impl FnMut(AuditEntry)) -> Result<Scan, AuditError> {
    let mut src = file.try_clone()?;
    src.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(src);
    let mut out = Scan::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)? as u64;
        if n == 0 {
            break;
        }
        out.len += n;
        if line.last() != Some(&b'\n') {
            break;
        }
        let Ok(text) = std::str::from_utf8(&line) else {
            break;
        };
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            let Ok(entry) = serde_json::from_str::<AuditEntry>(trimmed) else {
                break;
            };
            out.max_seq = out.max_seq.max(entry.seq);
            out.entries += 1;
            visit(entry);
        }
        out.valid_len = out.len;
    }

    // Count whatever follows the first bad line as torn.
    out.len = file.metadata()?.len().max(out.len);
    Ok(out)
}

/// Read every valid entry of the live file. Rotated files are not read.
/// A missing file reads as empty.
pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entries = Vec::new();
    scan(&file, |entry| entries.push(entry))?;
    Ok(entries)
}

/// Entries concerning one job.
pub fn read_job_entries(path: &Path, job: &JobName) -> Result<Vec<AuditEntry>, AuditError> {
    Ok(read_entries(path)?
        .into_iter()
        .filter(|e| e.event.job() == job)
        .collect())
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
