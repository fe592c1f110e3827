//! # Dispatcher and Worker Pool
//!
//! The control loop of the crawl. One task owns admission: it pulls URLs
//! off the frontier whenever the adaptive concurrency limit has a free
//! slot, and spawns a worker per URL. Workers classify their URL with a
//! HEAD probe, then either scan it as a page (feeding new links back into
//! the frontier) or download it as a document (feeding bytes to the
//! analyzer and a row to the manifest).
//!
//! ## Accounting rules
//!
//! - `active` is incremented at dispatch and decremented by an RAII guard,
//!   so every exit route of a worker (success, failure, panic) releases
//!   its slot exactly once.
//! - Any fetch failure halves the concurrency limit (multiplicative
//!   decrease) and is confined to that task's outcome; the crawl never
//!   aborts because of one URL.
//! - The shared state mutex is only ever held for bookkeeping; every
//!   network and filesystem operation happens outside it.
//!
//! A separate lightweight controller task ticks every two seconds to sample
//! throughput, grow the limit (additive increase), and write periodic
//! checkpoints.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio::io::AsyncWriteExt;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, instrument, warn};

use crate::analyzer::Analyzer;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::CrawlError;
use crate::crawler::links::extract_links;
use crate::events::{CrawlEvent, EventSender};
use crate::report::{FetchStatus, Finding, MANIFEST_FLUSH_THRESHOLD, ManifestEntry, ManifestWriter};
use crate::scope;
use crate::state::{CrawlState, SharedState};

/// Cadence of the controller task.
const CONTROLLER_TICK: Duration = Duration::from_secs(2);

/// Cadence of periodic safety checkpoints.
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(300);

/// Backoff while the pool is at its concurrency limit.
const ADMISSION_BACKOFF: Duration = Duration::from_millis(100);

/// Wait while the queue is empty but workers are still in flight.
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// How a crawl run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The frontier drained and every worker finished.
    Completed,
    /// A stop was requested; progress was checkpointed for resume.
    Interrupted,
}

/// What the classification probe decided about a URL.
enum UrlKind {
    Page,
    Document,
    Other(String),
}

/// Releases a worker slot when dropped, so the `active` count stays
/// symmetric on every exit route.
struct ActiveGuard {
    state: SharedState,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .throttle
            .release();
    }
}

/// The dispatcher for one crawl run.
#[derive(Clone)]
pub struct Crawler {
    config: Arc<CrawlerConfig>,
    client: reqwest::Client,
    state: SharedState,
    stop: Arc<AtomicBool>,
    events: EventSender,
    analyzer: Arc<Analyzer>,
    checkpoints: Arc<CheckpointStore>,
    manifest: Arc<ManifestWriter>,
}

impl Crawler {
    /// Builds the dispatcher and its shared HTTP client. The connection
    /// pool is sized to the concurrency ceiling so pooled-connection
    /// exhaustion can never throttle the crawl below its intended limit.
    pub fn new(
        config: Arc<CrawlerConfig>,
        state: SharedState,
        stop: Arc<AtomicBool>,
        events: EventSender,
        analyzer: Arc<Analyzer>,
        checkpoints: Arc<CheckpointStore>,
        manifest: Arc<ManifestWriter>,
    ) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(config.concurrency_cap)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            client,
            state,
            stop,
            events,
            analyzer,
            checkpoints,
            manifest,
        })
    }

    fn locked(&self) -> MutexGuard<'_, CrawlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: CrawlEvent) {
        let _ = self.events.send(event);
    }

    /// Runs the crawl to completion or interruption.
    ///
    /// On natural completion the manifest is flushed and the checkpoint
    /// file deleted; its absence is the "no unfinished crawl" signal. On
    /// interruption a final checkpoint and manifest flush are written;
    /// workers still in flight are left to finish on their own and their
    /// outcomes are not counted.
    #[instrument(skip(self), fields(start_url = %self.config.start_url))]
    pub async fn run(&self) -> CrawlOutcome {
        info!(scope = %self.config.scope_root, "starting crawl");
        let controller = self.spawn_controller();

        enum Step {
            Dispatch(String),
            Backoff,
            Idle,
            Done,
        }

        let outcome = loop {
            if self.stop.load(Ordering::SeqCst) {
                break CrawlOutcome::Interrupted;
            }

            self.flush_manifest_if_due();

            let step = {
                let mut state = self.locked();
                if state.frontier.is_empty() {
                    if state.throttle.active() == 0 {
                        Step::Done
                    } else {
                        Step::Idle
                    }
                } else if state.throttle.try_acquire() {
                    match state.frontier.pop() {
                        Some(task) => Step::Dispatch(task.url),
                        None => {
                            state.throttle.release();
                            Step::Idle
                        }
                    }
                } else {
                    Step::Backoff
                }
            };

            match step {
                Step::Done => break CrawlOutcome::Completed,
                Step::Idle => sleep(IDLE_WAIT).await,
                Step::Backoff => sleep(ADMISSION_BACKOFF).await,
                Step::Dispatch(url) => {
                    if !self.config.request_delay.is_zero() {
                        sleep(self.config.request_delay).await;
                    }
                    let worker = self.clone();
                    let guard = ActiveGuard {
                        state: Arc::clone(&self.state),
                    };
                    tokio::spawn(async move {
                        let _guard = guard;
                        worker.process(url).await;
                    });
                }
            }
        };

        controller.abort();

        match outcome {
            CrawlOutcome::Completed => {
                self.flush_manifest();
                if let Err(e) = self.checkpoints.clear() {
                    error!(error = %e, "failed to remove checkpoint after completion");
                }
                info!("crawl complete");
            }
            CrawlOutcome::Interrupted => {
                self.save_checkpoint();
                self.flush_manifest();
                info!("crawl interrupted, progress checkpointed");
            }
        }
        outcome
    }

    /// Spawns the periodic controller: throughput sampling, additive
    /// increase, progress events, and safety checkpoints.
    fn spawn_controller(&self) -> tokio::task::JoinHandle<()> {
        let crawler = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(CONTROLLER_TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_checkpoint = Instant::now();

            loop {
                ticker.tick().await;
                if crawler.stop.load(Ordering::SeqCst) {
                    break;
                }

                let (progress, checkpoint) = {
                    let mut state = crawler.locked();
                    let bytes_downloaded = state.stats.bytes_downloaded;
                    let speed_bps = state.throttle.tick(bytes_downloaded);
                    let progress = CrawlEvent::Progress {
                        active: state.throttle.active(),
                        limit: state.throttle.limit(),
                        queued: state.frontier.queued(),
                        downloaded: state.stats.downloaded,
                        speed_bps,
                    };
                    let checkpoint = (last_checkpoint.elapsed() >= CHECKPOINT_INTERVAL)
                        .then(|| Checkpoint::capture(&state));
                    (progress, checkpoint)
                };

                crawler.send(progress);
                if let Some(checkpoint) = checkpoint {
                    last_checkpoint = Instant::now();
                    match crawler.checkpoints.save(&checkpoint) {
                        Ok(()) => crawler.send(CrawlEvent::CheckpointSaved {
                            path: crawler.checkpoints.path().to_path_buf(),
                        }),
                        // Losing one periodic snapshot is survivable; losing
                        // the crawl is not.
                        Err(e) => error!(error = %e, "periodic checkpoint failed"),
                    }
                }
            }
        })
    }

    /// Captures and writes a checkpoint now. Failures are logged, never
    /// propagated: the crawl prefers risking the latest snapshot over
    /// dying mid-run.
    pub fn save_checkpoint(&self) {
        let checkpoint = Checkpoint::capture(&self.locked());
        match self.checkpoints.save(&checkpoint) {
            Ok(()) => self.send(CrawlEvent::CheckpointSaved {
                path: self.checkpoints.path().to_path_buf(),
            }),
            Err(e) => error!(error = %e, "checkpoint save failed"),
        }
    }

    fn flush_manifest_if_due(&self) {
        let due = self.locked().manifest.len() >= MANIFEST_FLUSH_THRESHOLD;
        if due {
            self.flush_manifest();
        }
    }

    /// Drains buffered manifest rows and appends them to the log.
    pub fn flush_manifest(&self) {
        let entries = self.locked().drain_manifest();
        if let Err(e) = self.manifest.append(&entries) {
            error!(error = %e, rows = entries.len(), "manifest flush failed");
        }
    }

    /// Worker body: classify, then take the page or document path. All
    /// errors are converted to state updates here; nothing propagates into
    /// the control loop.
    #[instrument(skip(self), fields(url = %url))]
    async fn process(&self, url: String) {
        match self.classify(&url).await {
            Ok(UrlKind::Page) => self.scan_page(&url).await,
            Ok(UrlKind::Document) => self.fetch_document(&url).await,
            Ok(UrlKind::Other(content_type)) => {
                debug!(%content_type, "unsupported content type, skipping");
            }
            Err(e) => self.note_failure(&url, &e.to_string(), None),
        }
    }

    /// Lightweight metadata probe: read the content type without touching
    /// the body.
    async fn classify(&self, url: &str) -> Result<UrlKind, CrawlError> {
        let response = self
            .client
            .head(url)
            .timeout(self.config.probe_timeout)
            .send()
            .await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if content_type.contains("application/pdf") || is_document_url(url) {
            Ok(UrlKind::Document)
        } else if content_type.contains("text/html") {
            Ok(UrlKind::Page)
        } else {
            Ok(UrlKind::Other(content_type))
        }
    }

    /// Fetches a page, extracts its links, and offers the in-scope ones to
    /// the frontier.
    async fn scan_page(&self, url: &str) {
        let body = match self.fetch_page_body(url).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                // Oversized: abandoned, not parsed. Not a stress signal.
                debug!("page exceeds size ceiling, abandoned");
                return;
            }
            Err(e) => {
                self.note_failure(url, &e.to_string(), None);
                return;
            }
        };

        let links = extract_links(&body, url);
        let links_added = {
            let mut state = self.locked();
            state.stats.scanned += 1;
            links
                .iter()
                .filter(|link| self.admissible(link.as_str()))
                .filter(|link| state.frontier.offer(link.as_str()))
                .count()
        };

        debug!(found = links.len(), added = links_added, "page scanned");
        self.send(CrawlEvent::PageScanned {
            url: url.to_string(),
            links_added,
        });
    }

    /// Whether a discovered link may enter the frontier.
    fn admissible(&self, link: &str) -> bool {
        if scope::is_in_scope(link, &self.config.scope_root) {
            return true;
        }
        // Optional relaxation: documents hosted next to the scope but not
        // under it (e.g. a shared /files/ area) are still collected.
        self.config.same_host_documents && is_document_url(link) && same_host(link, &self.config.scope_root)
    }

    /// Fetches a page body up to the configured ceiling. `Ok(None)` means
    /// the page was oversized and abandoned.
    async fn fetch_page_body(&self, url: &str) -> Result<Option<String>, CrawlError> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.config.page_timeout)
            .send()
            .await?
            .error_for_status()?;

        if let Some(length) = response.content_length() {
            if length > self.config.page_size_limit as u64 {
                return Ok(None);
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.config.page_size_limit {
                return Ok(None);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }

    /// Downloads a document, records the outcome in the manifest, and hands
    /// the bytes to the analyzer. Exactly one manifest row per attempt.
    async fn fetch_document(&self, url: &str) {
        // Cheap pre-check against the URL-derived path; the authoritative
        // name may change once Content-Disposition is known.
        let provisional = match scope::local_path_for(&self.config.output_dir, url, None) {
            Some(path) => path,
            None => {
                self.note_failure(url, "URL does not parse", Some(""));
                return;
            }
        };
        if file_is_nonempty(&provisional).await {
            self.note_skip(url, &provisional);
            return;
        }

        match self.download(url).await {
            Ok(Downloaded::Saved { path, bytes }) => {
                {
                    let mut state = self.locked();
                    state.stats.downloaded += 1;
                    state.manifest.push(ManifestEntry::new(
                        url,
                        &path.display().to_string(),
                        FetchStatus::Success,
                        "",
                    ));
                }
                info!(path = %path.display(), bytes, "document saved");
                self.send(CrawlEvent::DocumentSaved {
                    url: url.to_string(),
                    path: path.clone(),
                    bytes,
                });
                self.analyze_document(url, &path).await;
            }
            Ok(Downloaded::AlreadyPresent { path }) => self.note_skip(url, &path),
            Err(e) => {
                self.note_failure(url, &e.to_string(), Some(&provisional.display().to_string()))
            }
        }
    }

    /// Streams a document to disk in bounded chunks, so memory stays flat
    /// regardless of document size.
    async fn download(&self, url: &str) -> Result<Downloaded, CrawlError> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.config.document_timeout)
            .send()
            .await?
            .error_for_status()?;

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let path = scope::local_path_for(&self.config.output_dir, url, disposition.as_deref())
            .ok_or_else(|| CrawlError::UnmappableUrl(url.to_string()))?;

        // The server-declared name may differ from the provisional one; a
        // previous run could already have produced this file.
        if file_is_nonempty(&path).await {
            return Ok(Downloaded::AlreadyPresent { path });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(&path).await?;
        let mut bytes: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
            self.locked().stats.bytes_downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(Downloaded::Saved { path, bytes })
    }

    /// Runs the analyzer over a downloaded document and folds its excerpts
    /// into the shared findings. Analyzer problems never fail the task.
    async fn analyze_document(&self, url: &str, path: &Path) {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "could not read back downloaded document");
                return;
            }
        };

        let text = self.analyzer.extract_text(bytes).await;
        let excerpts = self.analyzer.analyze(&text, &self.config.topics).await;
        let count = excerpts.len();

        {
            let mut state = self.locked();
            state.stats.analyzed += 1;
            state.stats.content_bytes += text.len() as u64;
            if count > 0 {
                state.stats.relevant += 1;
                state.findings.extend(excerpts.into_iter().map(|e| Finding {
                    topic: e.topic,
                    source_url: url.to_string(),
                    quote: e.quote,
                    summary: e.summary,
                }));
            }
        }

        if count > 0 {
            self.send(CrawlEvent::FindingsExtracted {
                url: url.to_string(),
                count,
            });
        }
    }

    /// Records a failed attempt: error counter, multiplicative decrease,
    /// and, when the task had reached the document path, a FAILED
    /// manifest row.
    fn note_failure(&self, url: &str, error: &str, manifest_path: Option<&str>) {
        warn!(error, "fetch failed");
        {
            let mut state = self.locked();
            state.stats.errors += 1;
            state.throttle.record_failure();
            if let Some(local_path) = manifest_path {
                state
                    .manifest
                    .push(ManifestEntry::new(url, local_path, FetchStatus::Failed, error));
            }
        }
        self.send(CrawlEvent::FetchFailed {
            url: url.to_string(),
            error: error.to_string(),
        });
    }

    fn note_skip(&self, url: &str, path: &Path) {
        debug!(path = %path.display(), "document already present, skipping");
        self.locked().manifest.push(ManifestEntry::new(
            url,
            &path.display().to_string(),
            FetchStatus::SkippedExists,
            "",
        ));
        self.send(CrawlEvent::DocumentSkipped {
            url: url.to_string(),
        });
    }
}

enum Downloaded {
    Saved { path: PathBuf, bytes: u64 },
    AlreadyPresent { path: PathBuf },
}

/// Whether the URL names a document by suffix alone.
fn is_document_url(url: &str) -> bool {
    let without_fragment = url.split_once('#').map(|(base, _)| base).unwrap_or(url);
    let path_only = without_fragment
        .split_once('?')
        .map(|(base, _)| base)
        .unwrap_or(without_fragment);
    path_only.to_lowercase().ends_with(".pdf")
}

fn same_host(url: &str, other: &str) -> bool {
    match (url::Url::parse(url), url::Url::parse(other)) {
        (Ok(a), Ok(b)) => a.host_str().is_some() && a.host_str() == b.host_str(),
        _ => false,
    }
}

async fn file_is_nonempty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_suffix_detection_ignores_case_and_query() {
        assert!(is_document_url("https://example.com/a/Report.PDF"));
        assert!(is_document_url("https://example.com/a/file.pdf?version=2"));
        assert!(is_document_url("https://example.com/a/file.pdf#page=3"));
        assert!(!is_document_url("https://example.com/a/page.html"));
        assert!(!is_document_url("https://example.com/pdf/"));
    }

    #[test]
    fn same_host_compares_hosts_only() {
        assert!(same_host(
            "https://example.com/files/a.pdf",
            "https://example.com/docs/"
        ));
        assert!(!same_host(
            "https://cdn.example.com/a.pdf",
            "https://example.com/docs/"
        ));
        assert!(!same_host("not a url", "https://example.com/"));
    }
}
