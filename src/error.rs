//! Error types for the prospector crate

use thiserror::Error;

/// Result type for prospector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for prospector operations
#[derive(Debug, Error)]
pub enum Error {
    /// Fetch or dispatch error
    #[error("crawl error: {0}")]
    Crawl(#[from] crate::crawler::CrawlError),

    /// Content analyzer error
    #[error("analyzer error: {0}")]
    Analyzer(#[from] crate::analyzer::AnalyzerError),

    /// Checkpoint persistence error
    #[error("persistence error: {0}")]
    Persist(#[from] crate::checkpoint::PersistError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The start URL is not a valid absolute URL
    #[error("invalid start URL: {0}")]
    InvalidStartUrl(String),
}
