//! Error types for the analyzer module

use thiserror::Error;

/// Error type for analyzer operations
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The API key environment variable is missing
    #[error("GEMINI_API_KEY environment variable is not set")]
    MissingApiKey,

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message body
        message: String,
    },

    /// Rate limit retries were exhausted
    #[error("rate limited, gave up after {attempts} attempts")]
    RateLimitExhausted {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
