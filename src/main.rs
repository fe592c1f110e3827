//! # Prospector CLI
//!
//! Command-line front end for the crawl engine. Everything here is
//! presentation and wiring: argument parsing, tracing setup, collaborator
//! construction, event rendering, and the final report write. The engine
//! itself never prints; it reports through the event channel consumed
//! below.
//!
//! Exit status is 0 for both natural completion and signal-driven orderly
//! shutdown; only initialization failures (bad URL, missing credentials,
//! unwritable output directory) exit non-zero.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use prospector::analyzer::{Analyzer, DEFAULT_MODEL};
use prospector::checkpoint::CheckpointStore;
use prospector::crawler::{CrawlOutcome, Crawler, CrawlerConfig};
use prospector::events::{self, CrawlEvent};
use prospector::report::{ManifestWriter, compile_report};
use prospector::shutdown;
use prospector::state::{CrawlState, RunInfo};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Crawl a web directory tree, download its PDFs, and compile topic findings",
    long_about = None
)]
struct Cli {
    /// Starting URL; the crawl never leaves this directory subtree
    #[arg(required = true)]
    url: String,

    /// Output directory for documents, manifest, and report
    #[arg(short, long, default_value = "harvest")]
    output: PathBuf,

    /// Comma-separated topics to compile findings for
    #[arg(short, long, value_delimiter = ',', required = true)]
    topics: Vec<String>,

    /// Ceiling for the adaptive concurrency limit
    #[arg(short, long, default_value_t = 16)]
    concurrency: usize,

    /// Delay between dispatches in milliseconds
    #[arg(short, long, default_value_t = 0)]
    delay: u64,

    /// Resume the unfinished crawl recorded in the output directory
    #[arg(short, long)]
    resume: bool,

    /// Also collect same-host document links outside the path scope
    #[arg(long)]
    same_host_documents: bool,

    /// LLM model for topic analysis
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prospector=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    Url::parse(&cli.url).with_context(|| format!("invalid start URL: {}", cli.url))?;

    let topics: Vec<String> = cli
        .topics
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    anyhow::ensure!(!topics.is_empty(), "at least one non-empty topic is required");

    // The analyzer is the only collaborator allowed to abort startup: a
    // crawl without credentials would download everything and analyze
    // nothing.
    let analyzer = Analyzer::from_env(&cli.model).context("failed to initialize analyzer")?;

    tokio::fs::create_dir_all(&cli.output)
        .await
        .with_context(|| format!("cannot create output directory {}", cli.output.display()))?;

    let checkpoints = Arc::new(CheckpointStore::new(cli.output.join("crawl_checkpoint.json")));
    let manifest = Arc::new(ManifestWriter::new(cli.output.join("crawl_manifest.csv")));

    let state = if cli.resume {
        match checkpoints.load() {
            Some(checkpoint) => {
                if checkpoint.start_url != cli.url {
                    eprintln!(
                        "[resume] checkpoint was made for {}, continuing that crawl",
                        checkpoint.start_url
                    );
                }
                println!(
                    "[resume] {} queued, {} visited, {} findings so far",
                    checkpoint.queue.len(),
                    checkpoint.visited.len(),
                    checkpoint.findings.len()
                );
                let run = RunInfo {
                    start_url: checkpoint.start_url.clone(),
                    keywords: checkpoint.keywords.clone(),
                };
                let (frontier, stats, findings) = checkpoint.into_parts();
                CrawlState::resumed(run, cli.concurrency, frontier, stats, findings)
            }
            None => {
                println!("[resume] no checkpoint found, starting fresh");
                fresh_state(&cli, &topics)
            }
        }
    } else {
        fresh_state(&cli, &topics)
    };

    let config = Arc::new(
        CrawlerConfig::builder(state.run.start_url.clone())
            .output_dir(cli.output.clone())
            .topics(state.run.keywords.clone())
            .concurrency_cap(cli.concurrency)
            .request_delay(Duration::from_millis(cli.delay))
            .same_host_documents(cli.same_host_documents)
            .build(),
    );

    println!("[*] scope: {}", config.scope_root);
    println!("[*] topics: {}", config.topics.join(", "));
    println!("[*] concurrency ceiling: {}", config.concurrency_cap);

    let shared = state.into_shared();
    let stop = Arc::new(AtomicBool::new(false));
    let (events_tx, mut events_rx) = events::channel();

    let crawler = Crawler::new(
        Arc::clone(&config),
        Arc::clone(&shared),
        Arc::clone(&stop),
        events_tx.clone(),
        Arc::new(analyzer),
        Arc::clone(&checkpoints),
        Arc::clone(&manifest),
    )?;

    shutdown::spawn_signal_listener(Arc::clone(&stop), crawler.clone(), events_tx.clone());

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            render_event(event);
        }
    });

    let outcome = crawler.run().await;
    printer.abort();

    let (findings, keywords, stats) = {
        let state = shared.lock().unwrap_or_else(|e| e.into_inner());
        (state.findings.clone(), state.run.keywords.clone(), state.stats)
    };

    let report = compile_report(&findings, &keywords, &config.scope_root);
    let report_path = cli.output.join("topic_report.md");
    match tokio::fs::write(&report_path, report).await {
        Ok(()) => println!(
            "[report] {} findings -> {}",
            findings.len(),
            report_path.display()
        ),
        Err(e) => tracing::error!(error = %e, "failed to write report"),
    }

    println!(
        "[*] pages scanned: {} | documents: {} | analyzed: {} | relevant: {} | errors: {}",
        stats.scanned, stats.downloaded, stats.analyzed, stats.relevant, stats.errors
    );
    match outcome {
        CrawlOutcome::Completed => println!("[*] crawl complete"),
        CrawlOutcome::Interrupted => println!("[*] crawl interrupted, resume with --resume"),
    }

    Ok(())
}

fn fresh_state(cli: &Cli, topics: &[String]) -> CrawlState {
    CrawlState::new(
        RunInfo {
            start_url: cli.url.clone(),
            keywords: topics.to_vec(),
        },
        cli.concurrency,
    )
}

fn render_event(event: CrawlEvent) {
    match event {
        CrawlEvent::Progress {
            active,
            limit,
            queued,
            downloaded,
            speed_bps,
        } => println!(
            "[crawl] workers {active}/{limit} | queue {queued} | docs {downloaded} | {:.2} MB/s",
            speed_bps / (1024.0 * 1024.0)
        ),
        CrawlEvent::DocumentSaved { url, bytes, .. } => {
            println!("[saved] {url} ({bytes} bytes)");
        }
        CrawlEvent::DocumentSkipped { url } => println!("[skip] {url} already present"),
        CrawlEvent::FetchFailed { url, error } => eprintln!("[failed] {url}: {error}"),
        CrawlEvent::FindingsExtracted { url, count } => {
            println!("[findings] {count} from {url}");
        }
        CrawlEvent::CheckpointSaved { path } => {
            println!("[checkpoint] saved to {}", path.display());
        }
        CrawlEvent::ShutdownRequested => println!("[!] stopping, press Ctrl-C again to force"),
        CrawlEvent::PageScanned { .. } => {}
    }
}
