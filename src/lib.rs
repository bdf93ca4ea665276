//! # modem-watch
//!
//! Monitors a cable modem's downstream signal quality by polling its
//! diagnostic web page, tracking incremental error-counter deltas across
//! polls, and persisting a running history of anomalous events.
//!
//! The interesting part is the reconciliation: cumulative error counters
//! reset both on reboots (announced through the device's boot time) and on
//! silent internal resets (announced by nothing at all), and the tracker
//! must tell "new errors" apart from both.
//!
//! ## Quick Start
//!
//! ```no_run
//! use modem_watch::{Config, PollLoop, run_with_shutdown};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.modem.password = "hunter2".to_string();
//!
//!     let cancel = CancellationToken::new();
//!     let poller = PollLoop::new(&config, cancel.clone())?;
//!
//!     // Poll until SIGTERM/SIGINT
//!     run_with_shutdown(poller, cancel).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Diagnostic page retrieval
pub mod fetcher;
/// Signal-quality threshold checks
pub mod monitor;
/// The poll loop orchestrator
pub mod poller;
/// Retry logic with exponential backoff
pub mod retry;
/// Diagnostic page scraping
pub mod scrape;
/// Durable state storage
pub mod store;
/// Cross-poll delta tracking
pub mod tracker;
/// Core domain types
pub mod types;

// Re-export commonly used types
pub use config::{Config, ModemConfig, PersistenceConfig, RetryConfig, ThresholdConfig};
pub use error::{Error, Result, ScrapeError};
pub use fetcher::PageFetcher;
pub use monitor::{SignalWarning, ThresholdMonitor};
pub use poller::PollLoop;
pub use scrape::UptimeInfo;
pub use store::PersistenceStore;
pub use tracker::{DeltaTracker, PollOutcome};
pub use types::{ChannelRecord, ChannelStats, FrequencySnapshot, PersistedState};

use tokio_util::sync::CancellationToken;

/// Run the poll loop with graceful signal handling
///
/// Spawns a waiter that cancels `cancel` on the first termination signal;
/// the loop finishes its current cycle (persisting its state) and exits.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(poller: PollLoop, cancel: CancellationToken) -> Result<()> {
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_cancel.cancel();
    });
    poller.run().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Signal registration may fail in restricted environments (containers,
    // tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
