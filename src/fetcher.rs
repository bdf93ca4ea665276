//! Authenticated retrieval of the modem's diagnostic page
//!
//! The device requires a two-step exchange: a GET against the root page
//! establishes the session (via a cookie in the response), then the
//! DocsisStatus resource is fetched with that cookie and HTTP Basic
//! authentication. Both URLs are hard-coded in the firmware.
//!
//! Transport failures are transient by nature here — the modem drops its
//! web interface entirely while rebooting — so fetches run under the
//! bounded exponential-backoff policy from [`crate::retry`].

use crate::config::{ModemConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fetches the raw diagnostic page content
pub struct PageFetcher {
    client: reqwest::Client,
    modem: ModemConfig,
    retry: RetryConfig,
}

impl PageFetcher {
    /// Creates a fetcher with a cookie-keeping HTTP client
    pub fn new(modem: ModemConfig, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(modem.request_timeout)
            .build()?;
        Ok(Self {
            client,
            modem,
            retry,
        })
    }

    /// Fetch the diagnostic page, retrying transient failures
    ///
    /// Returns the raw page content on success, or the last error once the
    /// retry budget is exhausted or `cancel` fires during a backoff wait.
    pub async fn fetch_status_page(&self, cancel: &CancellationToken) -> Result<String> {
        retry_with_backoff(&self.retry, cancel, || self.fetch_once()).await
    }

    /// One two-step fetch attempt
    async fn fetch_once(&self) -> Result<String> {
        // The root page sets the session cookie the status page requires;
        // the client's cookie store carries it into the second request
        let session = self
            .client
            .get(&self.modem.base_url)
            .basic_auth(&self.modem.username, Some(&self.modem.password))
            .send()
            .await?;
        if !session.status().is_success() {
            return Err(Error::HttpStatus {
                status: session.status().as_u16(),
            });
        }

        let status_url = self.modem.status_url();
        debug!(url = %status_url, "Fetching diagnostic page");
        let response = self
            .client
            .get(&status_url)
            .basic_auth(&self.modem.username, Some(&self.modem.password))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                status: response.status().as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
