//! Crash-safe persistence of crawl progress.
//!
//! A checkpoint is a JSON snapshot of the frontier plus the run's cumulative
//! counters and findings. Saves go through a temp-file-then-rename sequence,
//! so the file on disk is always either the previous complete snapshot or
//! the new one, never a torn write, even if the process dies mid-save. The
//! file's presence is the resume signal: it is deleted when a crawl finishes
//! naturally.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::frontier::Frontier;
use crate::report::Finding;
use crate::state::{CrawlState, CrawlStats};

/// Error type for checkpoint persistence.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable snapshot of a run. Round-trips exactly: the visited set is
/// restored member-for-member and the queue keeps its FIFO order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Every URL ever scheduled.
    pub visited: Vec<String>,
    /// URLs still waiting, in dispatch order.
    pub queue: Vec<String>,
    /// Seed URL of the interrupted run.
    pub start_url: String,
    /// Topic list of the interrupted run.
    pub keywords: Vec<String>,
    /// Pages scanned so far.
    #[serde(default)]
    pub scanned: u64,
    /// Documents downloaded so far.
    #[serde(default)]
    pub downloaded: u64,
    /// Documents analyzed so far.
    #[serde(default)]
    pub analyzed_count: u64,
    /// Documents that yielded findings.
    #[serde(default)]
    pub relevant_count: u64,
    /// Extracted text volume in bytes.
    #[serde(default)]
    pub total_content_bytes: u64,
    /// Findings accumulated so far.
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl Checkpoint {
    /// Captures a consistent snapshot. The caller holds the state lock, so
    /// the frontier can never be observed mid-mutation.
    pub fn capture(state: &CrawlState) -> Self {
        let (visited, queue) = state.frontier.snapshot();
        Self {
            visited,
            queue,
            start_url: state.run.start_url.clone(),
            keywords: state.run.keywords.clone(),
            scanned: state.stats.scanned,
            downloaded: state.stats.downloaded,
            analyzed_count: state.stats.analyzed,
            relevant_count: state.stats.relevant,
            total_content_bytes: state.stats.content_bytes,
            findings: state.findings.clone(),
        }
    }

    /// Rebuilds the restorable pieces of run state.
    pub fn into_parts(self) -> (Frontier, CrawlStats, Vec<Finding>) {
        let frontier = Frontier::restore(self.visited, self.queue);
        let stats = CrawlStats {
            scanned: self.scanned,
            downloaded: self.downloaded,
            errors: 0,
            analyzed: self.analyzed_count,
            relevant: self.relevant_count,
            bytes_downloaded: 0,
            content_bytes: self.total_content_bytes,
        };
        (frontier, stats, self.findings)
    }
}

/// Reads and writes the checkpoint file for one crawl.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store targeting `path`. The parent directory must exist
    /// before the first save.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `checkpoint` atomically: serialize into a temp file in the
    /// same directory, sync it, then rename over the real path.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), PersistError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, checkpoint)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PersistError::Io(e.error))?;
        debug!(path = %self.path.display(), "checkpoint saved");
        Ok(())
    }

    /// Loads the checkpoint if one exists. A missing file means no
    /// unfinished crawl; an unreadable or malformed file is logged and
    /// treated the same way, so a corrupt checkpoint can never block a
    /// restart.
    pub fn load(&self) -> Option<Checkpoint> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "checkpoint unreadable, starting fresh");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "checkpoint corrupt, starting fresh");
                None
            }
        }
    }

    /// Removes the checkpoint file after a natural completion. Absence is
    /// not an error.
    pub fn clear(&self) -> Result<(), PersistError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistError::Io(e)),
        }
    }
}
