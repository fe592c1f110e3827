//! # Crawler Configuration Module
//!
//! Configuration for a crawl run, built once at startup and shared
//! read-only by every worker. Uses a builder pattern for flexible
//! construction from CLI arguments.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: the resolved configuration, including the normalized
//!   scope root every link check compares against
//! - `CrawlerConfigBuilder`: builder with polite defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::scope;

/// Configuration for a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// The seed URL.
    pub start_url: String,

    /// Scope boundary, normalized to end with `/`. Links must sit under
    /// this prefix to be followed.
    pub scope_root: String,

    /// Local root directory for downloads, manifest, and report.
    pub output_dir: PathBuf,

    /// Topics the analyzer filters documents for.
    pub topics: Vec<String>,

    /// Ceiling for the adaptive concurrency limit.
    pub concurrency_cap: usize,

    /// Politeness delay before each dispatch.
    pub request_delay: Duration,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Hard ceiling on page bodies; oversized pages are abandoned unparsed.
    pub page_size_limit: usize,

    /// Follow document links on the same host even when they fall outside
    /// the strict path scope. Off by default: the crawl stays inside the
    /// subtree it was pointed at.
    pub same_host_documents: bool,

    /// Timeout for classification probes (HEAD).
    pub probe_timeout: Duration,

    /// Timeout for page fetches.
    pub page_timeout: Duration,

    /// Timeout for document downloads.
    pub document_timeout: Duration,
}

impl CrawlerConfig {
    /// Create a new builder seeded with `start_url`.
    pub fn builder(start_url: impl Into<String>) -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new(start_url)
    }
}

/// Builder for CrawlerConfig
#[derive(Debug)]
pub struct CrawlerConfigBuilder {
    start_url: String,
    output_dir: PathBuf,
    topics: Vec<String>,
    concurrency_cap: usize,
    request_delay: Duration,
    user_agent: String,
    page_size_limit: usize,
    same_host_documents: bool,
    probe_timeout: Duration,
    page_timeout: Duration,
    document_timeout: Duration,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            output_dir: PathBuf::from("harvest"),
            topics: Vec::new(),
            concurrency_cap: 16,
            request_delay: Duration::ZERO,
            user_agent: format!("prospector/{}", env!("CARGO_PKG_VERSION")),
            page_size_limit: 2 * 1024 * 1024,
            same_host_documents: false,
            probe_timeout: Duration::from_secs(10),
            page_timeout: Duration::from_secs(10),
            document_timeout: Duration::from_secs(60),
        }
    }

    /// Set the local output directory.
    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the topic list for analysis.
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    /// Set the concurrency ceiling. Clamped to at least 1.
    pub fn concurrency_cap(mut self, cap: usize) -> Self {
        self.concurrency_cap = cap.max(1);
        self
    }

    /// Set the politeness delay between dispatches.
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the page body ceiling in bytes.
    pub fn page_size_limit(mut self, limit: usize) -> Self {
        self.page_size_limit = limit;
        self
    }

    /// Allow same-host document links outside the strict path scope.
    pub fn same_host_documents(mut self, enabled: bool) -> Self {
        self.same_host_documents = enabled;
        self
    }

    /// Set the classification probe timeout.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the page fetch timeout.
    pub fn page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Set the document download timeout.
    pub fn document_timeout(mut self, timeout: Duration) -> Self {
        self.document_timeout = timeout;
        self
    }

    /// Build the configuration. The scope root is the start URL normalized
    /// to end with a path separator.
    pub fn build(self) -> CrawlerConfig {
        CrawlerConfig {
            scope_root: scope::normalize_root(&self.start_url),
            start_url: self.start_url,
            output_dir: self.output_dir,
            topics: self.topics,
            concurrency_cap: self.concurrency_cap,
            request_delay: self.request_delay,
            user_agent: self.user_agent,
            page_size_limit: self.page_size_limit,
            same_host_documents: self.same_host_documents,
            probe_timeout: self.probe_timeout,
            page_timeout: self.page_timeout,
            document_timeout: self.document_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_root_is_normalized() {
        let config = CrawlerConfig::builder("https://example.com/docs").build();
        assert_eq!(config.scope_root, "https://example.com/docs/");

        let config = CrawlerConfig::builder("https://example.com/docs/").build();
        assert_eq!(config.scope_root, "https://example.com/docs/");
    }

    #[test]
    fn cap_never_drops_below_one() {
        let config = CrawlerConfig::builder("https://example.com/")
            .concurrency_cap(0)
            .build();
        assert_eq!(config.concurrency_cap, 1);
    }
}
