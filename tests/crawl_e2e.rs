//! End-to-end crawl scenarios against a mock HTTP server.
//!
//! The analyzer never reaches the network in these tests: the served
//! documents are not parseable PDFs, so text extraction yields nothing and
//! the topic pre-filter short-circuits the API call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use prospector::analyzer::Analyzer;
use prospector::checkpoint::CheckpointStore;
use prospector::crawler::{CrawlOutcome, Crawler, CrawlerConfig};
use prospector::events;
use prospector::report::ManifestWriter;
use prospector::scope;
use prospector::state::{CrawlState, RunInfo, SharedState};

struct Harness {
    crawler: Crawler,
    state: SharedState,
    stop: Arc<AtomicBool>,
    output: tempfile::TempDir,
}

fn harness(start_url: &str) -> Harness {
    let output = tempfile::tempdir().expect("tempdir");
    let config = Arc::new(
        CrawlerConfig::builder(start_url)
            .output_dir(output.path())
            .topics(vec!["Revenue".to_string()])
            .concurrency_cap(8)
            .build(),
    );
    let state = CrawlState::new(
        RunInfo {
            start_url: config.start_url.clone(),
            keywords: config.topics.clone(),
        },
        config.concurrency_cap,
    )
    .into_shared();
    let stop = Arc::new(AtomicBool::new(false));
    let (events_tx, _events_rx) = events::channel();

    let crawler = Crawler::new(
        Arc::clone(&config),
        Arc::clone(&state),
        Arc::clone(&stop),
        events_tx,
        Arc::new(
            Analyzer::new("test-key", "test-model")
                .expect("analyzer")
                .with_base_url("http://127.0.0.1:1"),
        ),
        Arc::new(CheckpointStore::new(
            output.path().join("crawl_checkpoint.json"),
        )),
        Arc::new(ManifestWriter::new(output.path().join("crawl_manifest.csv"))),
    )
    .expect("crawler");

    Harness {
        crawler,
        state,
        stop,
        output,
    }
}

fn manifest_content(harness: &Harness) -> String {
    std::fs::read_to_string(harness.output.path().join("crawl_manifest.csv")).unwrap_or_default()
}

#[tokio::test]
async fn in_scope_document_is_fetched_once_and_out_of_scope_ignored() {
    let mut server = mockito::Server::new_async().await;
    let root = format!("{}/", server.url());

    let page = r#"<html><body>
        <a href="report.pdf">in scope</a>
        <a href="http://example.invalid/outside.pdf">out of scope</a>
        <a href="report.pdf#copy">duplicate</a>
    </body></html>"#;
    let head_root = server
        .mock("HEAD", "/")
        .with_header("content-type", "text/html")
        .create_async()
        .await;
    let get_root = server
        .mock("GET", "/")
        .with_header("content-type", "text/html")
        .with_body(page)
        .create_async()
        .await;
    let head_doc = server
        .mock("HEAD", "/report.pdf")
        .with_header("content-type", "application/pdf")
        .create_async()
        .await;
    let get_doc = server
        .mock("GET", "/report.pdf")
        .with_header("content-type", "application/pdf")
        .with_body(b"%PDF-1.4 dummy".as_slice())
        .expect(1)
        .create_async()
        .await;

    let harness = harness(&root);
    let outcome = harness.crawler.run().await;
    assert_eq!(outcome, CrawlOutcome::Completed);

    head_root.assert_async().await;
    get_root.assert_async().await;
    head_doc.assert_async().await;
    get_doc.assert_async().await;

    let manifest = manifest_content(&harness);
    let success_rows: Vec<&str> = manifest
        .lines()
        .filter(|line| line.contains("SUCCESS"))
        .collect();
    assert_eq!(success_rows.len(), 1);
    assert!(success_rows[0].contains("/report.pdf"));
    assert!(!manifest.contains("outside.pdf"));

    // The document landed where the manifest says, non-empty.
    let local_path = success_rows[0].split(',').nth(2).expect("local_path column");
    let metadata = std::fs::metadata(local_path).expect("downloaded file");
    assert!(metadata.len() > 0);

    // Natural completion removes the checkpoint.
    assert!(!harness.output.path().join("crawl_checkpoint.json").exists());

    let state = harness.state.lock().unwrap();
    assert_eq!(state.stats.scanned, 1);
    assert_eq!(state.stats.downloaded, 1);
    assert_eq!(state.stats.errors, 0);
    assert!(state.frontier.is_empty());
    // The out-of-scope link was never even marked visited.
    assert!(!state.frontier.is_visited("http://example.invalid/outside.pdf"));
}

#[tokio::test]
async fn failed_download_is_logged_and_halves_concurrency() {
    let mut server = mockito::Server::new_async().await;
    let doc_url = format!("{}/bad.pdf", server.url());

    server
        .mock("HEAD", "/bad.pdf")
        .with_header("content-type", "application/pdf")
        .create_async()
        .await;
    server
        .mock("GET", "/bad.pdf")
        .with_status(500)
        .create_async()
        .await;

    let harness = harness(&doc_url);
    let outcome = harness.crawler.run().await;
    assert_eq!(outcome, CrawlOutcome::Completed);

    let manifest = manifest_content(&harness);
    assert!(manifest.contains("FAILED"));
    assert!(!manifest.contains("SUCCESS,"));

    let state = harness.state.lock().unwrap();
    assert_eq!(state.stats.errors, 1);
    assert_eq!(state.stats.downloaded, 0);
    // One failure: the initial limit of 2 drops to 1.
    assert_eq!(state.throttle.limit(), 1);
}

#[tokio::test]
async fn existing_file_is_skipped_without_refetch() {
    let mut server = mockito::Server::new_async().await;
    let doc_url = format!("{}/cached.pdf", server.url());

    server
        .mock("HEAD", "/cached.pdf")
        .with_header("content-type", "application/pdf")
        .create_async()
        .await;
    let get_doc = server
        .mock("GET", "/cached.pdf")
        .expect(0)
        .create_async()
        .await;

    let harness = harness(&doc_url);
    let existing =
        scope::local_path_for(harness.output.path(), &doc_url, None).expect("local path");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, b"already here").unwrap();

    let outcome = harness.crawler.run().await;
    assert_eq!(outcome, CrawlOutcome::Completed);

    get_doc.assert_async().await;
    let manifest = manifest_content(&harness);
    assert!(manifest.contains("SKIPPED_EXISTS"));
}

#[tokio::test]
async fn stop_flag_interrupts_and_checkpoints() {
    let server = mockito::Server::new_async().await;
    let root = format!("{}/", server.url());

    let harness = harness(&root);
    // Request a stop before the first dispatch: the run must exit
    // immediately, write a checkpoint, and keep the seed queued for resume.
    harness.stop.store(true, Ordering::SeqCst);

    let outcome = harness.crawler.run().await;
    assert_eq!(outcome, CrawlOutcome::Interrupted);

    let store = CheckpointStore::new(harness.output.path().join("crawl_checkpoint.json"));
    let checkpoint = store.load().expect("checkpoint written on interruption");
    assert_eq!(checkpoint.start_url, root);
    assert_eq!(checkpoint.queue, vec![root.clone()]);
    assert!(checkpoint.visited.contains(&root));
}
