//! # Crawl Engine Module
//!
//! Breadth-first, scope-bounded crawling with adaptive concurrency. This
//! module owns the dispatcher control loop, the worker pool, link
//! extraction, and the run configuration; the frontier, throttle, and
//! checkpointing it drives live in their own top-level modules.
//!
//! ## Key Components
//!
//! - `Crawler`: the dispatcher: admission control, classification, and the
//!   page/document worker paths
//! - `CrawlerConfig`: per-run settings with a builder
//! - `extract_links`: hyperlink extraction from fetched pages
//! - `CrawlOutcome`: whether the run drained naturally or was interrupted

mod config;
mod dispatch;
mod error;
mod links;

pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use dispatch::{CrawlOutcome, Crawler};
pub use error::CrawlError;
pub use links::extract_links;
