//! The shared mutable core of a crawl run.
//!
//! Everything the workers, the controller tick, and the shutdown path touch
//! concurrently lives in one [`CrawlState`] aggregate behind a single
//! `std::sync::Mutex`. The aggregate is constructed once per run and passed
//! by `Arc` into every task; no component owns ambient global state. Lock
//! discipline: critical sections are short and never span an `.await`;
//! network and filesystem I/O always happen outside the lock.

use std::sync::{Arc, Mutex};

use crate::frontier::Frontier;
use crate::report::{Finding, ManifestEntry};
use crate::throttle::ConcurrencyController;

/// Identity of the run, carried so checkpoints can be built from state alone.
#[derive(Debug, Clone)]
pub struct RunInfo {
    /// The seed URL the crawl started from.
    pub start_url: String,
    /// Topics the analyzer filters for.
    pub keywords: Vec<String>,
}

/// Cumulative counters for the run. All monotonically increasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlStats {
    /// Pages fetched and scanned for links.
    pub scanned: u64,
    /// Documents downloaded successfully.
    pub downloaded: u64,
    /// Failed fetch or processing attempts.
    pub errors: u64,
    /// Documents run through the analyzer.
    pub analyzed: u64,
    /// Documents that yielded at least one finding.
    pub relevant: u64,
    /// Raw bytes transferred for documents.
    pub bytes_downloaded: u64,
    /// Bytes of extracted text handed to the analyzer.
    pub content_bytes: u64,
}

/// Aggregate state for one crawl run.
#[derive(Debug)]
pub struct CrawlState {
    /// BFS queue and visited set.
    pub frontier: Frontier,
    /// Concurrency accounting and AIMD limit.
    pub throttle: ConcurrencyController,
    /// Cumulative counters.
    pub stats: CrawlStats,
    /// Manifest rows awaiting the next flush.
    pub manifest: Vec<ManifestEntry>,
    /// Findings accumulated for the final report.
    pub findings: Vec<Finding>,
    /// Run identity for checkpointing.
    pub run: RunInfo,
}

/// Handle shared by every concurrent task of a run.
pub type SharedState = Arc<Mutex<CrawlState>>;

impl CrawlState {
    /// Fresh state with the seed URL queued.
    pub fn new(run: RunInfo, concurrency_cap: usize) -> Self {
        let mut frontier = Frontier::new();
        frontier.seed(&run.start_url);
        Self {
            frontier,
            throttle: ConcurrencyController::new(concurrency_cap),
            stats: CrawlStats::default(),
            manifest: Vec::new(),
            findings: Vec::new(),
            run,
        }
    }

    /// State rebuilt from restored components, used on resume.
    pub fn resumed(
        run: RunInfo,
        concurrency_cap: usize,
        frontier: Frontier,
        stats: CrawlStats,
        findings: Vec<Finding>,
    ) -> Self {
        Self {
            frontier,
            throttle: ConcurrencyController::new(concurrency_cap),
            stats,
            manifest: Vec::new(),
            findings,
            run,
        }
    }

    /// Wraps the state for sharing across tasks.
    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Takes the buffered manifest rows, leaving the buffer empty. The
    /// caller writes them outside the lock.
    pub fn drain_manifest(&mut self) -> Vec<ManifestEntry> {
        std::mem::take(&mut self.manifest)
    }
}
