//! The poll loop
//!
//! Sequences one cycle — fetch, extract, threshold-check, reconcile,
//! persist — and repeats it on a fixed interval until shutdown. Transport
//! trouble (the device rebooting, a flaky LAN) only costs the current
//! cycle; a malformed page or a failed save is fatal and propagates out.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::PageFetcher;
use crate::monitor::ThresholdMonitor;
use crate::scrape;
use crate::store::PersistenceStore;
use crate::tracker::{DeltaTracker, PollOutcome};
use crate::types::snapshot_from_channels;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Orchestrates the fetch → extract → reconcile → persist cycle
///
/// Single logical thread of control: one cycle runs to completion before
/// the next begins. The persisted state is loaded once at construction and
/// kept in memory across cycles.
pub struct PollLoop {
    fetcher: PageFetcher,
    store: PersistenceStore,
    tracker: DeltaTracker,
    monitor: ThresholdMonitor,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl PollLoop {
    /// Builds the loop from configuration, loading any prior state
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let fetcher = PageFetcher::new(config.modem.clone(), config.retry.clone())?;
        let store = PersistenceStore::new(&config.persistence.datafile);
        let tracker = DeltaTracker::new(store.load());
        let monitor = ThresholdMonitor::new(config.thresholds.clone());
        Ok(Self {
            fetcher,
            store,
            tracker,
            monitor,
            poll_interval: config.poll_interval,
            cancel,
        })
    }

    /// Run poll cycles until the cancellation token fires
    ///
    /// A cycle that fails in transport is logged and skipped; the next
    /// cycle starts after the usual interval. Scrape and persistence
    /// failures are returned to the caller.
    pub async fn run(mut self) -> Result<()> {
        info!(interval_secs = self.poll_interval.as_secs(), "Poll loop started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Ok(outcome) => debug!(?outcome, "Poll cycle completed"),
                Err(e) if is_transient(&e) => {
                    error!(error = %e, "Poll cycle failed in transport, skipping this cycle");
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        info!("Poll loop stopped");
        Ok(())
    }

    /// Execute a single poll cycle
    pub async fn run_once(&mut self) -> Result<PollOutcome> {
        let page = self.fetcher.fetch_status_page(&self.cancel).await?;

        let channels = scrape::extract_channels(&page)?;
        let time = scrape::extract_uptime(&page)?;
        debug!(
            channels = channels.len(),
            system_time = time.system_time,
            boot_time = time.boot_time,
            "Diagnostic page scraped"
        );

        // Threshold observations run on every poll, including reboot and
        // anomaly polls
        self.monitor.check(&channels, time.system_time);

        let snapshot = snapshot_from_channels(&channels);
        let outcome = self.tracker.observe(snapshot, time);

        if let Some(state) = self.tracker.state() {
            self.store.save(state)?;
        }
        Ok(outcome)
    }
}

/// Whether an error costs only the current cycle
///
/// Transport failures recover on their own once the device comes back;
/// everything else means the data or the storage cannot be trusted.
fn is_transient(error: &Error) -> bool {
    matches!(
        error,
        Error::Network(_) | Error::HttpStatus { .. } | Error::ShuttingDown
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModemConfig, RetryConfig};
    use crate::error::ScrapeError;
    use crate::types::PersistedState;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_uri: &str, datafile: std::path::PathBuf) -> Config {
        let mut config = Config::default();
        config.modem = ModemConfig {
            base_url: format!("{server_uri}/"),
            password: "secret".to_string(),
            ..ModemConfig::default()
        };
        config.retry = RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        config.persistence.datafile = datafile;
        config
    }

    fn status_page(channel_list: &str, uptime_list: &str) -> String {
        format!(
            "<html><script>\
             function InitTagValue() {{ var tagValueList = '{uptime_list}'; }}\
             function InitUpdateView() {{ }}\
             function InitDsTableTagValue() {{ var tagValueList = '{channel_list}'; }}\
             function InitCmIpProvModeTag() {{ }}\
             </script></html>"
        )
    }

    fn uptime_list(sys_time: &str, uptime: &str) -> String {
        let mut tokens = vec!["x"; 15];
        tokens[10] = sys_time;
        tokens[14] = uptime;
        tokens.join("|")
    }

    async fn mount_page(server: &MockServer, body: String) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/DocsisStatus.htm"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn first_cycle_seeds_and_persists_state() {
        let server = MockServer::start().await;
        let channel_list =
            "1|1|Locked|QAM256|4|549000000 Hz|1.5|40.2|10|0|".to_string();
        mount_page(
            &server,
            status_page(&channel_list, &uptime_list("Thu Jun 04 01:36:07 2020", "0:10:00")),
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let datafile = dir.path().join("ModemData.json");
        let config = test_config(&server.uri(), datafile.clone());

        let mut poller = PollLoop::new(&config, CancellationToken::new()).unwrap();
        let outcome = poller.run_once().await.unwrap();
        assert_eq!(outcome, PollOutcome::ColdStart);

        let saved: PersistedState =
            serde_json::from_str(&std::fs::read_to_string(&datafile).unwrap()).unwrap();
        assert_eq!(saved.baseline["549000000 Hz"].correctable_err, 10);
        assert!(saved.event_history.is_empty());
    }

    #[tokio::test]
    async fn malformed_page_propagates_a_scrape_error() {
        let server = MockServer::start().await;
        mount_page(&server, "<html>firmware update broke everything</html>".to_string()).await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path().join("ModemData.json"));

        let mut poller = PollLoop::new(&config, CancellationToken::new()).unwrap();
        let err = poller.run_once().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Scrape(ScrapeError::MissingMarker { .. })
        ));
        assert!(
            !dir.path().join("ModemData.json").exists(),
            "a failed cycle must not write state"
        );
    }

    #[tokio::test]
    async fn unreachable_modem_is_a_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path().join("ModemData.json"));

        let mut poller = PollLoop::new(&config, CancellationToken::new()).unwrap();
        let err = poller.run_once().await.unwrap_err();
        assert!(is_transient(&err), "HTTP 503 must only cost the cycle");
    }

    #[tokio::test]
    async fn run_exits_promptly_on_cancelled_token() {
        // No server needed: a cancelled loop must not fetch at all
        let dir = tempfile::tempdir().unwrap();
        let config = test_config("http://127.0.0.1:1", dir.path().join("ModemData.json"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let poller = PollLoop::new(&config, cancel).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), poller.run()).await;
        assert!(result.expect("run must exit without sleeping a full interval").is_ok());
    }

    #[test]
    fn transient_classification_covers_transport_only() {
        assert!(is_transient(&Error::HttpStatus { status: 500 }));
        assert!(is_transient(&Error::ShuttingDown));
        assert!(!is_transient(&Error::Scrape(ScrapeError::MissingMarker {
            block: "channel",
            marker: "InitDsTableTagValue",
        })));
        assert!(!is_transient(&Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ))));
    }
}
