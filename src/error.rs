//! Error types for modem-watch
//!
//! This module provides error handling for the crate, including:
//! - Domain-specific scrape errors (missing markers, malformed token streams)
//! - Transport and storage error conversions
//! - A clean split between recoverable outcomes (cold start, transient
//!   network trouble) and fatal outcomes (malformed page, failed save)

use thiserror::Error;

/// Result type alias for modem-watch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modem-watch
///
/// Each variant includes enough context to diagnose which stage of the poll
/// cycle failed.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "modem.base_url")
        key: Option<String>,
    },

    /// Network error talking to the modem
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The modem answered with a non-success HTTP status
    #[error("modem returned HTTP status {status}")]
    HttpStatus {
        /// The status code of the failed response
        status: u16,
    },

    /// Diagnostic page scrape failed
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// I/O error (state file, password file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (state file, config file)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown requested while an operation was in progress
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Scrape errors: the diagnostic page did not match the embedded grammar
///
/// These are permanent for the poll in which they occur. A firmware change
/// that moves the markers is an external compatibility break, not something
/// the parser can adapt to.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A block delimiter was not found in the page content
    #[error("marker {marker:?} not found in {block} block")]
    MissingMarker {
        /// Which logical block was being located ("channel" or "uptime")
        block: &'static str,
        /// The marker substring that was absent
        marker: &'static str,
    },

    /// The channel token stream did not divide into complete records
    #[error("channel block truncated: {tokens} tokens is not a multiple of {group}")]
    TruncatedChannelBlock {
        /// Number of tokens remaining after header/trailer removal
        tokens: usize,
        /// Expected tokens per channel record
        group: usize,
    },

    /// The uptime token list was shorter than the fixed positions require
    #[error("uptime block too short: {tokens} tokens, need at least {needed}")]
    UptimeBlockTooShort {
        /// Number of tokens in the uptime list
        tokens: usize,
        /// Minimum token count for the fixed positional fields
        needed: usize,
    },

    /// A field failed to convert to its semantic type
    #[error("cannot parse {field} from {value:?}")]
    FieldParse {
        /// The schema field name (e.g., "power", "correctable count")
        field: &'static str,
        /// The raw token that failed to parse
        value: String,
    },

    /// The human-readable system time could not be parsed
    #[error("cannot parse system time from {value:?}")]
    TimeParse {
        /// The raw system-time string
        value: String,
    },

    /// The human-readable uptime duration could not be parsed
    #[error("cannot parse uptime duration from {value:?}")]
    UptimeParse {
        /// The raw uptime string
        value: String,
    },
}
