//! Diagnostic page scraping
//!
//! The modem embeds its channel table and uptime data as pipe-delimited
//! string arrays inside JavaScript init functions, not in the HTML itself.
//! This module implements a small dedicated parser for that grammar:
//!
//! - A block is located by a pair of marker substrings (the init function
//!   name and the next function's name).
//! - Inside a block, the token list sits between `var tagValueList = '`
//!   and `';`, delimited by `|`.
//! - The channel list carries a table-size header token first and one
//!   extraneous trailer token last; the remainder divides into groups of
//!   nine fields per channel.
//! - The uptime list is read at fixed positions: 10 (system time, ctime
//!   style) and 14 (uptime duration, `[D days ]HH:MM:SS`).
//!
//! Markers are fixed in the device firmware; if they change, that is an
//! external compatibility break surfaced as a [`ScrapeError`].

use crate::error::ScrapeError;
use crate::types::ChannelRecord;
use chrono::{Local, NaiveDateTime, TimeZone};

/// Start marker of the downstream channel block
const CHANNEL_BLOCK_START: &str = "InitDsTableTagValue";
/// End marker of the downstream channel block
const CHANNEL_BLOCK_END: &str = "function InitCmIpProvModeTag";
/// Start marker of the uptime block
const UPTIME_BLOCK_START: &str = "InitTagValue";
/// End marker of the uptime block
const UPTIME_BLOCK_END: &str = "function InitUpdateView";
/// Opening delimiter of a tag value list inside a block
const LIST_PREFIX: &str = "var tagValueList = '";
/// Closing delimiter of a tag value list
const LIST_SUFFIX: &str = "';";

/// Tokens per channel record in the downstream table
const CHANNEL_FIELDS: usize = 9;
/// Fixed position of the system-time field in the uptime list
const SYS_TIME_POS: usize = 10;
/// Fixed position of the uptime-duration field in the uptime list
const UPTIME_POS: usize = 14;

/// Boot/uptime data extracted from the diagnostic page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UptimeInfo {
    /// Device's current system time, epoch seconds
    pub system_time: i64,
    /// Device-reported uptime in seconds
    pub uptime_secs: i64,
    /// Derived boot time: `system_time - uptime_secs`
    pub boot_time: i64,
}

/// Locate a block by its marker pair and return the tag value list inside it
fn tag_value_list<'a>(
    content: &'a str,
    block: &'static str,
    start_marker: &'static str,
    end_marker: &'static str,
) -> Result<&'a str, ScrapeError> {
    let start = content
        .find(start_marker)
        .ok_or(ScrapeError::MissingMarker {
            block,
            marker: start_marker,
        })?;
    let rest = &content[start + start_marker.len()..];
    let end = rest.find(end_marker).ok_or(ScrapeError::MissingMarker {
        block,
        marker: end_marker,
    })?;
    let body = &rest[..end];

    let list_start = body.find(LIST_PREFIX).ok_or(ScrapeError::MissingMarker {
        block,
        marker: LIST_PREFIX,
    })?;
    let list_body = &body[list_start + LIST_PREFIX.len()..];
    let list_end = list_body
        .find(LIST_SUFFIX)
        .ok_or(ScrapeError::MissingMarker {
            block,
            marker: LIST_SUFFIX,
        })?;
    Ok(&list_body[..list_end])
}

fn parse_u32(field: &'static str, token: &str) -> Result<u32, ScrapeError> {
    token.trim().parse().map_err(|_| ScrapeError::FieldParse {
        field,
        value: token.to_string(),
    })
}

fn parse_f64(field: &'static str, token: &str) -> Result<f64, ScrapeError> {
    token.trim().parse().map_err(|_| ScrapeError::FieldParse {
        field,
        value: token.to_string(),
    })
}

fn parse_u64(field: &'static str, token: &str) -> Result<u64, ScrapeError> {
    token.trim().parse().map_err(|_| ScrapeError::FieldParse {
        field,
        value: token.to_string(),
    })
}

/// Extract the downstream channel table from raw page content
///
/// Fails hard for the current poll if the markers are absent or the token
/// stream does not divide evenly into complete nine-field records; channels
/// are never silently skipped.
pub fn extract_channels(content: &str) -> Result<Vec<ChannelRecord>, ScrapeError> {
    let list = tag_value_list(content, "channel", CHANNEL_BLOCK_START, CHANNEL_BLOCK_END)?;
    let tokens: Vec<&str> = list.split('|').collect();

    // Header (table size) plus trailer (extraneous end field) must both be
    // present even when the table itself is empty
    if tokens.len() < 2 {
        return Err(ScrapeError::TruncatedChannelBlock {
            tokens: tokens.len(),
            group: CHANNEL_FIELDS,
        });
    }
    let records = &tokens[1..tokens.len() - 1];
    if records.len() % CHANNEL_FIELDS != 0 {
        return Err(ScrapeError::TruncatedChannelBlock {
            tokens: records.len(),
            group: CHANNEL_FIELDS,
        });
    }

    let mut channels = Vec::with_capacity(records.len() / CHANNEL_FIELDS);
    for group in records.chunks_exact(CHANNEL_FIELDS) {
        channels.push(ChannelRecord {
            channel_num: parse_u32("channel number", group[0])?,
            status: group[1].to_string(),
            modulation: group[2].to_string(),
            channel_id: parse_u32("channel id", group[3])?,
            frequency: group[4].to_string(),
            power: parse_f64("power", group[5])?,
            snr: parse_f64("SNR", group[6])?,
            correctable_err: parse_u64("correctable count", group[7])?,
            uncorrectable_err: parse_u64("uncorrectable count", group[8])?,
        });
    }
    Ok(channels)
}

/// Extract boot/uptime data from raw page content
///
/// Reads the system-time and uptime-duration tokens at their fixed
/// positions and derives the boot epoch from them.
pub fn extract_uptime(content: &str) -> Result<UptimeInfo, ScrapeError> {
    let list = tag_value_list(content, "uptime", UPTIME_BLOCK_START, UPTIME_BLOCK_END)?;
    let tokens: Vec<&str> = list.split('|').collect();
    if tokens.len() <= UPTIME_POS {
        return Err(ScrapeError::UptimeBlockTooShort {
            tokens: tokens.len(),
            needed: UPTIME_POS + 1,
        });
    }

    let system_time = parse_system_time(tokens[SYS_TIME_POS])?;
    let uptime_secs = parse_uptime(tokens[UPTIME_POS])?;
    Ok(UptimeInfo {
        system_time,
        uptime_secs,
        boot_time: system_time - uptime_secs,
    })
}

/// Parse the device's ctime-style system time (`Thu Jun  4 01:36:07 2020`)
///
/// The device reports local time, so the conversion to epoch seconds goes
/// through the local timezone, matching how the state file's history keys
/// were produced historically.
fn parse_system_time(token: &str) -> Result<i64, ScrapeError> {
    let trimmed = token.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, "%a %b %d %H:%M:%S %Y")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%a %b %e %H:%M:%S %Y"))
        .map_err(|_| ScrapeError::TimeParse {
            value: token.to_string(),
        })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| ScrapeError::TimeParse {
            value: token.to_string(),
        })
}

/// Parse the device's uptime duration: `[D day(s) ]HH:MM:SS` or `MM:SS`
fn parse_uptime(token: &str) -> Result<i64, ScrapeError> {
    let err = || ScrapeError::UptimeParse {
        value: token.to_string(),
    };
    let trimmed = token.trim();

    let (days, clock) = match trimmed.find("day") {
        Some(pos) => {
            let days: i64 = trimmed[..pos].trim().parse().map_err(|_| err())?;
            let after = trimmed[pos + 3..].trim_start_matches('s').trim();
            (days, after)
        }
        None => (0, trimmed),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (h, m, s): (i64, i64, i64) = match parts.as_slice() {
        [h, m, s] => (
            h.trim().parse().map_err(|_| err())?,
            m.trim().parse().map_err(|_| err())?,
            s.trim().parse().map_err(|_| err())?,
        ),
        [m, s] => (
            0,
            m.trim().parse().map_err(|_| err())?,
            s.trim().parse().map_err(|_| err())?,
        ),
        _ => return Err(err()),
    };
    Ok(days * 86_400 + h * 3_600 + m * 60 + s)
}
