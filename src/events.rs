//! Events emitted by the crawl engine during a run.

use std::path::PathBuf;

use tokio::sync::mpsc;

/// Progress and outcome notifications for whoever is watching the crawl.
///
/// The engine never prints; it pushes these through an injected channel and
/// the binary (or a test harness) decides how to present them. Send failures
/// are ignored; a dropped receiver must not disturb the crawl.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// A page was fetched and scanned for links.
    PageScanned {
        /// Page URL.
        url: String,
        /// Links that passed scope checks and were newly queued.
        links_added: usize,
    },

    /// A document was downloaded and persisted.
    DocumentSaved {
        /// Document URL.
        url: String,
        /// Local destination.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },

    /// A document already existed locally and was not re-fetched.
    DocumentSkipped {
        /// Document URL.
        url: String,
    },

    /// A fetch or processing attempt failed. The concurrency limit has
    /// already been halved by the time this is observed.
    FetchFailed {
        /// URL of the failed attempt.
        url: String,
        /// Error detail.
        error: String,
    },

    /// The analyzer produced findings for a document.
    FindingsExtracted {
        /// Document URL.
        url: String,
        /// Number of findings.
        count: usize,
    },

    /// Periodic controller sample.
    Progress {
        /// In-flight work items.
        active: usize,
        /// Current concurrency allowance.
        limit: usize,
        /// Tasks waiting in the frontier.
        queued: usize,
        /// Documents downloaded so far.
        downloaded: u64,
        /// Throughput in bytes per second.
        speed_bps: f64,
    },

    /// A periodic or shutdown checkpoint was written.
    CheckpointSaved {
        /// Checkpoint file location.
        path: PathBuf,
    },

    /// A stop was requested; the engine is winding down.
    ShutdownRequested,
}

/// Sending half of the event channel, injected into the engine.
pub type EventSender = mpsc::UnboundedSender<CrawlEvent>;

/// Receiving half, consumed by the presentation layer.
pub type EventReceiver = mpsc::UnboundedReceiver<CrawlEvent>;

/// Creates the event channel for a run.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
