//! Configuration types for modem-watch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Modem connection settings
///
/// The diagnostic URLs are hard-coded in the device firmware, so the
/// defaults here match the factory values and rarely need changing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Base URL of the modem's web interface (default: "http://192.168.100.1/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Diagnostic resource fetched after the session is established
    /// (default: "DocsisStatus.htm")
    #[serde(default = "default_status_page")]
    pub status_page: String,

    /// Username for HTTP Basic authentication (default: "admin")
    #[serde(default = "default_username")]
    pub username: String,

    /// Password for HTTP Basic authentication
    ///
    /// Usually left empty in the config file and supplied at startup from a
    /// password file or the environment.
    #[serde(default)]
    pub password: String,

    /// Per-request timeout (default: 30 seconds)
    ///
    /// Bounds each individual GET; the retry policy bounds the overall
    /// fetch attempt.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl ModemConfig {
    /// Full URL of the diagnostic status resource
    pub fn status_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/{}", base, self.status_page)
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            status_page: default_status_page(),
            username: default_username(),
            password: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 10)
    ///
    /// The target device drops off the network while rebooting, so the
    /// default allows several minutes of unreachability before a cycle is
    /// given up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 5 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 120 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Signal-quality thresholds for out-of-range warnings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Warn when a channel's SNR drops below this value in dB (default: 36.0)
    #[serde(default = "default_min_snr")]
    pub min_snr: f64,

    /// Warn when the magnitude of a channel's power exceeds this value in
    /// dBmV (default: 7.0)
    #[serde(default = "default_max_power")]
    pub max_power: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_snr: default_min_snr(),
            max_power: default_max_power(),
        }
    }
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the state file shared with the visualization component
    /// (default: "ModemData.json")
    #[serde(default = "default_datafile")]
    pub datafile: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            datafile: default_datafile(),
        }
    }
}

/// Main configuration for the poll loop
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Modem connection settings
    #[serde(default)]
    pub modem: ModemConfig,

    /// Fetch retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Signal-quality warning thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// State-file settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Delay between completed poll cycles (default: 300 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings that serde cannot check structurally
    pub fn validate(&self) -> Result<()> {
        if !self.modem.base_url.starts_with("http://") && !self.modem.base_url.starts_with("https://")
        {
            return Err(Error::Config {
                message: format!("base_url must be an HTTP(S) URL, got {:?}", self.modem.base_url),
                key: Some("modem.base_url".to_string()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be at least 1.0".to_string(),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://192.168.100.1/".to_string()
}

fn default_status_page() -> String {
    "DocsisStatus.htm".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(120)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_min_snr() -> f64 {
    36.0
}

fn default_max_power() -> f64 {
    7.0
}

fn default_datafile() -> PathBuf {
    PathBuf::from("ModemData.json")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper (seconds-based)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
