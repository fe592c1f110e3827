//! Durable outputs of a crawl: the append-only fetch manifest and the
//! compiled topic report.
//!
//! The manifest is the audit trail: one CSV row per document fetch attempt,
//! buffered in memory and flushed on a count cadence so a long crawl never
//! holds its full history. The report is produced once, at completion or
//! forced shutdown, grouping every accumulated finding by topic.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Flush the manifest buffer whenever it reaches this many entries.
pub const MANIFEST_FLUSH_THRESHOLD: usize = 50;

/// Outcome of a single document fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    /// Downloaded and persisted.
    Success,
    /// The fetch or write failed; `error` carries the detail.
    Failed,
    /// A non-empty file already existed at the resolved path.
    SkippedExists,
}

impl FetchStatus {
    /// Manifest column form.
    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Success => "SUCCESS",
            FetchStatus::Failed => "FAILED",
            FetchStatus::SkippedExists => "SKIPPED_EXISTS",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the fetch manifest. Append-only; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Wall-clock time the outcome was recorded.
    pub timestamp: String,
    /// Source URL of the attempt.
    pub url: String,
    /// Local destination, or empty when none was resolved.
    pub local_path: String,
    /// Attempt outcome.
    pub status: FetchStatus,
    /// Error detail for failed attempts, empty otherwise.
    pub error: String,
}

impl ManifestEntry {
    /// Builds an entry stamped with the current local time.
    pub fn new(url: &str, local_path: &str, status: FetchStatus, error: &str) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            url: url.to_string(),
            local_path: local_path.to_string(),
            status,
            error: error.to_string(),
        }
    }
}

/// One unit of extracted information, owned by the report once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// The topic from the run's keyword list this finding matched.
    pub topic: String,
    /// Document the finding came from.
    pub source_url: String,
    /// Verbatim quote from the document.
    pub quote: String,
    /// One-sentence summary.
    pub summary: String,
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') || raw.contains('\r') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Appends manifest rows to a CSV log, writing the header exactly once.
///
/// The writer is stateless between calls: header presence is decided by
/// whether the file already has content, which keeps appends safe across
/// flushes and across resumed runs.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    path: PathBuf,
}

impl ManifestWriter {
    const HEADER: &'static str = "timestamp,url,local_path,status,error";

    /// Creates a writer targeting `path`. Nothing is written until the first
    /// flush.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the manifest log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `entries` to the log, creating it (with header) on first use.
    /// A no-op for an empty batch.
    pub fn append(&self, entries: &[ManifestEntry]) -> std::io::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut out = String::new();
        if needs_header {
            out.push_str(Self::HEADER);
            out.push('\n');
        }
        for entry in entries {
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                csv_field(&entry.timestamp),
                csv_field(&entry.url),
                csv_field(&entry.local_path),
                entry.status,
                csv_field(&entry.error),
            ));
        }
        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

/// Renders the final topic report as a Markdown document.
///
/// Sections follow the order of the run's topic list; topics the analyzer
/// surfaced outside that list are appended alphabetically. Topic matching is
/// case-insensitive.
pub fn compile_report(findings: &[Finding], topics: &[String], source_root: &str) -> String {
    let mut grouped: BTreeMap<String, Vec<&Finding>> = BTreeMap::new();
    for finding in findings {
        grouped
            .entry(finding.topic.to_lowercase())
            .or_default()
            .push(finding);
    }

    let mut out = String::new();
    out.push_str("# Topic Report\n\n");
    out.push_str(&format!("- **Source root:** {source_root}\n"));
    out.push_str(&format!("- **Topics:** {}\n", topics.join(", ")));
    out.push_str(&format!(
        "- **Generated:** {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("- **Findings:** {}\n", findings.len()));

    let mut ordered: Vec<String> = topics.iter().map(|t| t.to_lowercase()).collect();
    for key in grouped.keys() {
        if !ordered.contains(key) {
            ordered.push(key.clone());
        }
    }

    for key in ordered {
        let Some(entries) = grouped.get(&key) else {
            continue;
        };
        // Section headings use the topic's original casing.
        let display = &entries[0].topic;
        out.push_str(&format!("\n## {display}\n"));
        for finding in entries {
            out.push_str(&format!("\n### {}\n\n", finding.source_url));
            out.push_str(&format!("{}\n\n", finding.summary));
            out.push_str(&format!("> {}\n", finding.quote.replace('\n', "\n> ")));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn finding(topic: &str, url: &str) -> Finding {
        Finding {
            topic: topic.to_string(),
            source_url: url.to_string(),
            quote: "Revenue grew by 5%.".to_string(),
            summary: "Revenue grew.".to_string(),
        }
    }

    #[test]
    fn csv_fields_are_escaped() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn header_written_once_across_flushes() {
        let dir = tempdir().unwrap();
        let writer = ManifestWriter::new(dir.path().join("manifest.csv"));

        writer
            .append(&[ManifestEntry::new(
                "https://example.com/a.pdf",
                "out/a.pdf",
                FetchStatus::Success,
                "",
            )])
            .unwrap();
        writer
            .append(&[ManifestEntry::new(
                "https://example.com/b.pdf",
                "",
                FetchStatus::Failed,
                "HTTP 500",
            )])
            .unwrap();

        let content = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,url,local_path,status,error");
        assert!(lines[1].contains("SUCCESS"));
        assert!(lines[2].contains("FAILED"));
        assert!(lines[2].contains("HTTP 500"));
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let writer = ManifestWriter::new(dir.path().join("manifest.csv"));
        writer.append(&[]).unwrap();
        assert!(!writer.path().exists());
    }

    #[test]
    fn report_groups_by_topic_in_keyword_order() {
        let findings = vec![
            finding("Liquidity", "https://example.com/b.pdf"),
            finding("Revenue", "https://example.com/a.pdf"),
            finding("revenue", "https://example.com/c.pdf"),
        ];
        let topics = vec!["Revenue".to_string(), "Liquidity".to_string()];
        let report = compile_report(&findings, &topics, "https://example.com/docs/");

        let revenue_pos = report.find("## Revenue").unwrap();
        let liquidity_pos = report.find("## Liquidity").unwrap();
        assert!(revenue_pos < liquidity_pos);
        assert!(report.contains("- **Findings:** 3"));
        assert!(report.contains("> Revenue grew by 5%."));
        // Case-insensitive grouping: both casings land in one section.
        assert!(report.contains("https://example.com/c.pdf"));
    }

    #[test]
    fn report_appends_unlisted_topics() {
        let findings = vec![finding("Surprise", "https://example.com/s.pdf")];
        let topics = vec!["Revenue".to_string()];
        let report = compile_report(&findings, &topics, "root");
        assert!(report.contains("## Surprise"));
    }
}
