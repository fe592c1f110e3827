//! # Prospector: scope-bounded document crawling with topic compilation
//!
//! This crate crawls a web directory tree breadth-first, downloads every PDF
//! document it finds inside the scope, extracts topic-relevant passages with
//! the Gemini API, and compiles them into a Markdown report. The engine
//! adapts its own concurrency to observed network conditions and survives
//! interruption without losing work.
//!
//! ## Features
//!
//! - BFS frontier with a monotonic visited set: no URL is fetched twice
//! - Adaptive concurrency: additive increase while healthy, multiplicative
//!   decrease on any fetch failure
//! - Atomic JSON checkpoints for resume after interruption
//! - Streamed, idempotent document downloads with an append-only CSV
//!   manifest of every fetch outcome
//! - Strict URL-prefix scope enforcement and sanitized local paths, safe
//!   against adversarial URLs and headers
//! - Graceful and forced shutdown paths driven by a single stop flag
//! - Async API with Tokio; progress reported through an event channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! use prospector::analyzer::{Analyzer, DEFAULT_MODEL};
//! use prospector::checkpoint::CheckpointStore;
//! use prospector::crawler::{Crawler, CrawlerConfig};
//! use prospector::events;
//! use prospector::report::ManifestWriter;
//! use prospector::state::{CrawlState, RunInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(
//!         CrawlerConfig::builder("https://example.com/docs/")
//!             .topics(vec!["Revenue".to_string()])
//!             .build(),
//!     );
//!     let run = RunInfo {
//!         start_url: config.start_url.clone(),
//!         keywords: config.topics.clone(),
//!     };
//!     let state = CrawlState::new(run, config.concurrency_cap).into_shared();
//!     let (events_tx, _events_rx) = events::channel();
//!
//!     let crawler = Crawler::new(
//!         Arc::clone(&config),
//!         state,
//!         Arc::new(AtomicBool::new(false)),
//!         events_tx,
//!         Arc::new(Analyzer::from_env(DEFAULT_MODEL)?),
//!         Arc::new(CheckpointStore::new("checkpoint.json".into())),
//!         Arc::new(ManifestWriter::new("manifest.csv".into())),
//!     )?;
//!     crawler.run().await;
//!     Ok(())
//! }
//! ```

mod error;

pub mod analyzer;
pub mod checkpoint;
pub mod crawler;
pub mod events;
pub mod frontier;
pub mod report;
pub mod scope;
pub mod shutdown;
pub mod state;
pub mod throttle;

pub use error::{Error, Result};

/// Re-export of the most commonly used types
pub mod prelude {
    pub use crate::crawler::{CrawlOutcome, Crawler, CrawlerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::events::{CrawlEvent, EventSender};
    pub use crate::state::{CrawlState, RunInfo, SharedState};
}
