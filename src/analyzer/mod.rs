//! # Content Analyzer Module
//!
//! The boundary between the crawl engine and the language model. Documents
//! arrive as raw PDF bytes; what leaves is a list of fixed-shape excerpts,
//! one per topic-relevant passage the model identified.
//!
//! ## Key Components
//!
//! - `Analyzer`: text extraction plus topic analysis for one run
//! - `Excerpt`: validated `{topic, quote, summary}` record
//! - `GeminiClient`: the underlying REST client with rate-limit recovery
//!
//! Everything here fails soft by design: extraction errors yield empty text,
//! API errors yield zero excerpts, and malformed entries in the model's
//! response are skipped individually. The crawl never sees an error from
//! this module after construction; a document simply produces no findings.

mod client;
mod error;
mod types;

pub use client::GeminiClient;
pub use error::AnalyzerError;
pub use types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};

use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Default model for topic analysis.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upper bound on document text sent in one prompt, in bytes.
const PROMPT_TEXT_LIMIT: usize = 25_000;

/// One topic-relevant passage extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpt {
    /// The matched topic.
    pub topic: String,
    /// Verbatim quote.
    pub quote: String,
    /// One-sentence summary.
    pub summary: String,
}

/// Turns document bytes into topic-relevant excerpts via the Gemini API.
#[derive(Debug, Clone)]
pub struct Analyzer {
    client: GeminiClient,
    model: String,
}

impl Analyzer {
    /// Creates an analyzer from the `GEMINI_API_KEY` environment variable.
    /// This is the one initialization step allowed to fail the whole
    /// program: without credentials the crawl must not start.
    pub fn from_env(model: impl Into<String>) -> Result<Self, AnalyzerError> {
        let api_key =
            std::env::var("GEMINI_API_KEY").map_err(|_| AnalyzerError::MissingApiKey)?;
        Self::new(api_key, model)
    }

    /// Creates an analyzer with an explicit API key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AnalyzerError> {
        Ok(Self {
            client: GeminiClient::new(api_key)?,
            model: model.into(),
        })
    }

    /// Redirects API traffic, for tests against a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    /// Extracts plain text from PDF bytes. Parse failures are logged and
    /// yield an empty string; they are never fatal to the crawl.
    pub async fn extract_text(&self, bytes: Vec<u8>) -> String {
        let result = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
        })
        .await;

        match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to extract text from document");
                String::new()
            }
            Err(e) => {
                warn!(error = %e, "text extraction task failed");
                String::new()
            }
        }
    }

    /// Finds passages relevant to any of `topics` in `text`.
    ///
    /// The API call is skipped entirely when no topic occurs in the text
    /// (case-insensitive); most documents are irrelevant and this keeps
    /// external-call volume bounded. All errors collapse to an empty result.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn analyze(&self, text: &str, topics: &[String]) -> Vec<Excerpt> {
        if text.trim().is_empty() || topics.is_empty() {
            return Vec::new();
        }
        if !mentions_any_topic(text, topics) {
            debug!("no topic mentioned, skipping analysis call");
            return Vec::new();
        }

        let request = GenerateContentRequest {
            contents: vec![Content::new().with_text(build_prompt(text, topics))],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
            }),
        };

        let response = match self.client.generate_content(&self.model, &request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "analysis request failed");
                return Vec::new();
            }
        };

        let raw = response.text();
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => excerpts_from_value(value),
            Err(e) => {
                warn!(error = %e, "analysis response was not valid JSON");
                Vec::new()
            }
        }
    }
}

fn mentions_any_topic(text: &str, topics: &[String]) -> bool {
    let lowered = text.to_lowercase();
    topics
        .iter()
        .any(|topic| lowered.contains(&topic.to_lowercase()))
}

/// Clips `text` to the prompt size limit without splitting a UTF-8 character.
fn clip(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn build_prompt(text: &str, topics: &[String]) -> String {
    format!(
        "You are a research assistant. Read the following text from a document.\n\
         \n\
         Identify sections relevant to ANY of these topics: {topics:?}\n\
         \n\
         For EACH relevant section you find:\n\
         1. Name the specific TOPIC it matches (from the list above).\n\
         2. Extract a direct QUOTE.\n\
         3. Write a one-sentence SUMMARY.\n\
         \n\
         Respond with exactly a JSON list of objects, for example:\n\
         [{{\"topic\": \"Revenue\", \"quote\": \"Revenue grew by 5%...\", \"summary\": \"Q3 revenue saw positive growth.\"}}]\n\
         \n\
         If no relevant information is found for any topic, return an empty list: []\n\
         \n\
         Text to analyze:\n\
         {body}",
        body = clip(text, PROMPT_TEXT_LIMIT),
    )
}

/// Validates the model's loosely-structured response into `Excerpt`s.
///
/// The payload is untrusted: a list is expected, a single object is
/// tolerated, string fields are defaulted when missing, and entries with no
/// recognizable content are dropped without failing the batch.
fn excerpts_from_value(value: Value) -> Vec<Excerpt> {
    let entries = match value {
        Value::Array(entries) => entries,
        obj @ Value::Object(_) => vec![obj],
        _ => return Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            if !obj.contains_key("topic") && !obj.contains_key("quote") {
                return None;
            }
            let field = |key: &str| {
                obj.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            };
            let topic = field("topic");
            Some(Excerpt {
                topic: if topic.is_empty() { "general".to_string() } else { topic },
                quote: field("quote"),
                summary: field("summary"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefilter_matches_case_insensitively() {
        let topics = vec!["Revenue".to_string()];
        assert!(mentions_any_topic("quarterly REVENUE was up", &topics));
        assert!(!mentions_any_topic("nothing to see here", &topics));
    }

    #[tokio::test]
    async fn analyze_skips_api_when_prefilter_misses() {
        // Unroutable endpoint: if the pre-filter failed, the call would error
        // loudly instead of returning instantly.
        let analyzer = Analyzer::new("test-key", DEFAULT_MODEL)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let excerpts = analyzer
            .analyze("completely unrelated text", &["Revenue".to_string()])
            .await;
        assert!(excerpts.is_empty());
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let text = "aé".repeat(10);
        let clipped = clip(&text, 4);
        assert!(clipped.len() <= 4);
        assert!(text.starts_with(clipped));
    }

    #[test]
    fn list_response_is_validated_per_entry() {
        let value = json!([
            {"topic": "Revenue", "quote": "Revenue grew.", "summary": "Up."},
            {"topic": "Liquidity", "quote": "Cash is fine."},
            {"unrelated": true},
            42,
        ]);
        let excerpts = excerpts_from_value(value);
        assert_eq!(excerpts.len(), 2);
        assert_eq!(excerpts[0].topic, "Revenue");
        // Missing summary defaults to empty rather than dropping the entry.
        assert_eq!(excerpts[1].summary, "");
    }

    #[test]
    fn single_object_response_is_tolerated() {
        let value = json!({"topic": "Revenue", "quote": "q", "summary": "s"});
        let excerpts = excerpts_from_value(value);
        assert_eq!(excerpts.len(), 1);
    }

    #[test]
    fn missing_topic_defaults() {
        let value = json!([{"quote": "orphan quote"}]);
        let excerpts = excerpts_from_value(value);
        assert_eq!(excerpts[0].topic, "general");
    }

    #[test]
    fn non_json_shapes_yield_nothing() {
        assert!(excerpts_from_value(json!("just a string")).is_empty());
        assert!(excerpts_from_value(json!(null)).is_empty());
    }
}
