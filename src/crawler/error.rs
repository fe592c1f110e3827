//! Error types for the crawler module

use thiserror::Error;

/// Error type for fetch and dispatch operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Filesystem error while persisting a document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL that cannot be mapped to a local path
    #[error("cannot derive a local path for {0}")]
    UnmappableUrl(String),
}
