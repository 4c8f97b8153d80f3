// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot engine: turns a successful run's output directory into a generation.
//!
//! The artifact (archive file or commit + tag) is always finalized before the
//! registry records it. A crash in between leaves an orphan artifact that
//! [`SnapshotEngine::recover`] adopts or discards on the next start.

use crate::error::{PruneError, SnapshotError};
use chrono::{DateTime, SecondsFormat, Utc};
use rollcron_adapters::{ArchiveAdapter, ArchiveError, VcsAdapter};
use rollcron_core::{
    archive_file_name, generation_tag, parse_archive_file_name, Artifact, Generation, Job,
    JobName, Run, SnapshotMode,
};
use rollcron_storage::{tmp_path_for, FsStateWriter, RegistryStore, StateWriter};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What startup recovery changed for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Orphan artifacts that verified and are now recorded.
    pub adopted: Vec<u64>,
    /// Generations dropped from disk or registry, with the reason.
    pub discarded: Vec<(u64, String)>,
    /// Leftover temporary files removed.
    pub temp_removed: usize,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.discarded.is_empty() && self.temp_removed == 0
    }
}

/// Creates, verifies and deletes generations for every snapshot mode.
pub struct SnapshotEngine<V, A> {
    vcs: V,
    archive: A,
    registry: Arc<RegistryStore>,
    archive_root: PathBuf,
}

impl<V: VcsAdapter, A: ArchiveAdapter> SnapshotEngine<V, A> {
    pub fn new(vcs: V, archive: A, registry: Arc<RegistryStore>, archive_root: PathBuf) -> Self {
        Self {
            vcs,
            archive,
            registry,
            archive_root,
        }
    }

    pub fn registry(&self) -> &Arc<RegistryStore> {
        &self.registry
    }

    /// Directory holding a job's archive generations.
    pub fn archive_dir(&self, job: &Job) -> PathBuf {
        job.archive_dir
            .clone()
            .unwrap_or_else(|| self.archive_root.join(job.name.as_str()))
    }

    /// Record a new generation for a successful run.
    ///
    /// Returns `None` for jobs with snapshots disabled. Callers hold the
    /// job's lock so sequence numbers are handed out in completion order.
    pub async fn create(&self, job: &Job, run: &Run) -> Result<Option<Generation>, SnapshotError> {
        if job.snapshot == SnapshotMode::None {
            return Ok(None);
        }
        let source = job
            .output_dir
            .as_deref()
            .ok_or_else(|| SnapshotError::NoOutputDir(job.name.clone()))?;

        let generation = match job.snapshot {
            SnapshotMode::Archive => self.create_archive(job, source, run).await?,
            SnapshotMode::Git => self.create_commit(job, source, run).await?,
            SnapshotMode::None => return Ok(None),
        };

        self.registry
            .update(|r| r.job_mut(&job.name).record(generation.clone()))?;
        tracing::info!(
            job = %job.name,
            run_id = %run.id,
            seq = generation.seq,
            artifact = %generation.artifact,
            unchanged = generation.unchanged,
            "generation recorded"
        );
        Ok(Some(generation))
    }

    /// Whether a recorded generation's artifact is present and intact.
    pub async fn verify(&self, job: &Job, generation: &Generation) -> Result<bool, SnapshotError> {
        match &generation.artifact {
            Artifact::Archive { path } => {
                if !path.exists() {
                    return Ok(false);
                }
                match self.archive.verify(path).await {
                    Ok(()) => Ok(true),
                    Err(ArchiveError::Corrupt { .. }) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            Artifact::Commit { id, .. } => {
                let repo = repo_dir(job);
                Ok(self.vcs.commit_exists(repo, id).await?)
            }
        }
    }

    /// Remove a generation's artifact. Commits are never rewritten; only the
    /// generation's tag goes.
    pub async fn delete(&self, job: &Job, generation: &Generation) -> Result<(), PruneError> {
        match &generation.artifact {
            Artifact::Archive { path } => self.archive.delete(path).await?,
            Artifact::Commit { tag: Some(tag), .. } => {
                self.vcs.delete_tag(repo_dir(job), tag).await?
            }
            Artifact::Commit { tag: None, .. } => {}
        }
        Ok(())
    }

    async fn create_archive(
        &self,
        job: &Job,
        source: &Path,
        run: &Run,
    ) -> Result<Generation, SnapshotError> {
        let dir = self.archive_dir(job);
        std::fs::create_dir_all(&dir)?;

        let seq = self.next_seq(&job.name);
        let dest = dir.join(archive_file_name(&job.name, seq));
        let tmp = tmp_path_for(&dest);

        if let Err(e) = self.archive.create(source, &tmp).await {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        let writer = FsStateWriter;
        if let Err(e) = writer.rename(&tmp, &dest) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        writer.fsync_dir(&dir)?;

        if let Err(e) = self.archive.verify(&dest).await {
            tracing::error!(job = %job.name, seq, error = %e, "new archive failed verification");
            let _ = self.archive.delete(&dest).await;
            return Err(e.into());
        }

        Ok(Generation {
            seq,
            job: job.name.clone(),
            run_id: Some(run.id.clone()),
            created_at: run.finished_at,
            artifact: Artifact::Archive { path: dest },
            unchanged: false,
        })
    }

    async fn create_commit(
        &self,
        job: &Job,
        source: &Path,
        run: &Run,
    ) -> Result<Generation, SnapshotError> {
        self.vcs.ensure_repo(source).await?;
        let changed = self.vcs.stage_all(source).await?;
        let head = self.vcs.head(source).await?;

        let (commit, unchanged) = match head {
            Some(head) if changed == 0 => (head, true),
            head => {
                let message = commit_message(&job.name, run, changed);
                let id = self.vcs.commit(source, &message, head.is_none()).await?;
                (id, false)
            }
        };

        let seq = self.next_seq(&job.name);
        let tag = generation_tag(&job.name, seq);
        self.vcs.tag(source, &tag, &commit).await?;

        Ok(Generation {
            seq,
            job: job.name.clone(),
            run_id: Some(run.id.clone()),
            created_at: run.finished_at,
            artifact: Artifact::Commit {
                id: commit,
                tag: Some(tag),
            },
            unchanged,
        })
    }

    fn next_seq(&self, job: &JobName) -> u64 {
        self.registry
            .read(|r| r.job(job).map_or(1, |h| h.next_seq))
    }

    /// Reconcile a job's artifacts with the registry after a restart.
    pub async fn recover(
        &self,
        job: &Job,
        now: DateTime<Utc>,
    ) -> Result<RecoveryReport, SnapshotError> {
        match job.snapshot {
            SnapshotMode::Archive => self.recover_archives(job, now).await,
            SnapshotMode::Git => self.recover_commits(job, now).await,
            SnapshotMode::None => Ok(RecoveryReport::default()),
        }
    }

    async fn recover_archives(
        &self,
        job: &Job,
        now: DateTime<Utc>,
    ) -> Result<RecoveryReport, SnapshotError> {
        let mut report = RecoveryReport::default();
        let dir = self.archive_dir(job);
        let recorded: BTreeSet<u64> = self
            .registry
            .read(|r| r.generations(&job.name).iter().map(|g| g.seq).collect());

        let mut adopted = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries.filter_map(Result::ok).collect::<Vec<_>>(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".tmp") {
                if parse_archive_file_name(&job.name, name.trim_end_matches(".tmp")).is_some() {
                    std::fs::remove_file(&path)?;
                    report.temp_removed += 1;
                }
                continue;
            }
            let Some(seq) = parse_archive_file_name(&job.name, name) else {
                continue;
            };
            if recorded.contains(&seq) {
                continue;
            }
            match self.archive.verify(&path).await {
                Ok(()) => {
                    let created_at = std::fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .map(DateTime::<Utc>::from)
                        .unwrap_or(now);
                    tracing::warn!(job = %job.name, seq, path = %path.display(), "adopting orphan archive");
                    adopted.push(Generation {
                        seq,
                        job: job.name.clone(),
                        run_id: None,
                        created_at,
                        artifact: Artifact::Archive { path },
                        unchanged: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(job = %job.name, seq, error = %e, "discarding unverifiable orphan archive");
                    self.archive.delete(&path).await?;
                    report.discarded.push((seq, format!("orphan archive failed verification: {e}")));
                }
            }
        }

        let missing: Vec<u64> = self.registry.read(|r| {
            r.generations(&job.name)
                .iter()
                .filter(|g| g.archive_path().is_some_and(|p| !p.exists()))
                .map(|g| g.seq)
                .collect()
        });
        for seq in &missing {
            tracing::warn!(job = %job.name, seq, "archive missing, dropping record");
            report.discarded.push((*seq, "archive file missing".to_string()));
        }

        report.adopted = adopted.iter().map(|g| g.seq).collect();
        self.registry.update(|r| {
            let history = r.job_mut(&job.name);
            for generation in adopted {
                history.record(generation);
            }
            for seq in &missing {
                history.remove(*seq);
            }
        })?;
        Ok(report)
    }

    async fn recover_commits(
        &self,
        job: &Job,
        now: DateTime<Utc>,
    ) -> Result<RecoveryReport, SnapshotError> {
        let mut report = RecoveryReport::default();
        let Some(repo) = job.output_dir.as_deref() else {
            return Ok(report);
        };
        if !repo.exists() {
            return Ok(report);
        }

        let recorded = self.registry.read(|r| r.generations(&job.name).to_vec());
        let recorded_seqs: BTreeSet<u64> = recorded.iter().map(|g| g.seq).collect();
        let mut referenced: BTreeSet<String> = recorded
            .iter()
            .filter_map(|g| g.commit_id().map(str::to_string))
            .collect();

        let mut adopted = Vec::new();
        let prefix = format!("rollcron/{}/", job.name);
        for (tag, commit) in self.vcs.list_tags(repo, &prefix).await? {
            let Some(seq) = tag.strip_prefix(&prefix).and_then(|s| s.parse::<u64>().ok()) else {
                continue;
            };
            if recorded_seqs.contains(&seq) {
                continue;
            }
            if self.vcs.commit_exists(repo, &commit).await? {
                tracing::warn!(job = %job.name, seq, tag = %tag, "adopting orphan tag");
                referenced.insert(commit.clone());
                adopted.push(commit_generation(job, seq, commit, Some(tag), now));
            } else {
                self.vcs.delete_tag(repo, &tag).await?;
                report.discarded.push((seq, format!("tag {tag} points at a missing commit")));
            }
        }

        // A crash between commit and tag leaves an untagged rollcron commit at HEAD.
        let subject_prefix = format!("rollcron: {} ", job.name);
        if let Some(head) = self.vcs.recent_commits(repo, 1).await?.into_iter().next() {
            if head.subject.starts_with(&subject_prefix) && !referenced.contains(&head.id) {
                let next = self.next_seq(&job.name);
                let seq = adopted.iter().map(|g| g.seq + 1).fold(next, u64::max);
                let tag = generation_tag(&job.name, seq);
                self.vcs.tag(repo, &tag, &head.id).await?;
                tracing::warn!(job = %job.name, seq, commit = %head.id, "adopting untagged commit");
                adopted.push(commit_generation(job, seq, head.id, Some(tag), now));
            }
        }

        let mut missing = Vec::new();
        for generation in &recorded {
            if let Some(id) = generation.commit_id() {
                if !self.vcs.commit_exists(repo, id).await? {
                    tracing::warn!(job = %job.name, seq = generation.seq, commit = id, "commit missing, dropping record");
                    missing.push(generation.seq);
                    report
                        .discarded
                        .push((generation.seq, format!("commit {id} missing")));
                }
            }
        }

        report.adopted = adopted.iter().map(|g| g.seq).collect();
        self.registry.update(|r| {
            let history = r.job_mut(&job.name);
            for generation in adopted {
                history.record(generation);
            }
            for seq in &missing {
                history.remove(*seq);
            }
        })?;
        Ok(report)
    }
}

/// Repository directory for a job's commit generations.
fn repo_dir(job: &Job) -> &Path {
    job.output_dir.as_deref().unwrap_or(&job.working_dir)
}

fn commit_generation(
    job: &Job,
    seq: u64,
    id: String,
    tag: Option<String>,
    created_at: DateTime<Utc>,
) -> Generation {
    Generation {
        seq,
        job: job.name.clone(),
        run_id: None,
        created_at,
        artifact: Artifact::Commit { id, tag },
        unchanged: false,
    }
}

/// Commit message for a run: job name, run id and finish time in the
/// subject, number of changed files in the body.
pub fn commit_message(job: &JobName, run: &Run, changed: usize) -> String {
    format!(
        "rollcron: {} run {} at {}\n\n{} file{} changed",
        job,
        run.id,
        run.finished_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        changed,
        if changed == 1 { "" } else { "s" }
    )
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
