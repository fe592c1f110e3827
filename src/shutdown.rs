//! Signal interception and orderly-stop coordination.
//!
//! The listener never performs work inside a signal context beyond what is
//! explicitly safe: the first signal only flips the shared stop flag, and
//! the control loop does the actual checkpoint-and-flush. A second signal
//! while that is still running forces an immediate flush-and-exit, which the
//! atomic checkpoint rename makes reentrant-safe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::crawler::Crawler;
use crate::events::{CrawlEvent, EventSender};

/// Spawns the signal listener for a run.
///
/// First Ctrl-C/SIGTERM: sets `stop` and lets the crawl wind down
/// cooperatively. Second: saves a checkpoint, flushes the manifest, and
/// exits with a success status; in-flight workers are abandoned and their
/// outcomes were never counted.
pub fn spawn_signal_listener(
    stop: Arc<AtomicBool>,
    crawler: Crawler,
    events: EventSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("stop signal received, winding down");
        stop.store(true, Ordering::SeqCst);
        let _ = events.send(CrawlEvent::ShutdownRequested);

        wait_for_signal().await;
        warn!("second stop signal, flushing and exiting now");
        crawler.save_checkpoint();
        crawler.flush_manifest();
        std::process::exit(0);
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, falling back to Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
