//! Core domain types for modem-watch
//!
//! The persisted state file is shared with an external visualization
//! component, so the on-disk shape (an ordered 4-tuple with the original
//! field names) is part of the public contract and must not drift.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One downstream channel row scraped from the diagnostic page
///
/// Channel numbers can be reassigned by the device across reboots, so the
/// `frequency` string is the stable identity used to correlate channels
/// between polls.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelRecord {
    /// Row index in the downstream channel table
    pub channel_num: u32,
    /// Lock status as reported by the device (e.g., "Locked")
    pub status: String,
    /// Modulation scheme (e.g., "QAM256")
    pub modulation: String,
    /// Device-assigned channel ID
    pub channel_id: u32,
    /// Frequency string, canonical identity key (e.g., "549000000 Hz")
    pub frequency: String,
    /// Received signal power in dBmV
    pub power: f64,
    /// Signal-to-noise ratio in dB
    pub snr: f64,
    /// Cumulative correctable-error counter since device boot
    pub correctable_err: u64,
    /// Cumulative uncorrectable-error counter since device boot
    pub uncorrectable_err: u64,
}

/// Reduced per-frequency record kept in the baseline snapshot
///
/// Field names are serialized exactly as the visualization collaborator
/// expects them in the state file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Device-assigned channel ID
    #[serde(rename = "Channel ID")]
    pub channel_id: u32,
    /// Received signal power in dBmV
    #[serde(rename = "Power")]
    pub power: f64,
    /// Signal-to-noise ratio in dB
    #[serde(rename = "SNR")]
    pub snr: f64,
    /// Cumulative correctable-error counter
    #[serde(rename = "Correctable Err")]
    pub correctable_err: u64,
    /// Cumulative uncorrectable-error counter
    #[serde(rename = "Uncorrectable Err")]
    pub uncorrectable_err: u64,
}

/// Mapping from frequency string to reduced channel record
pub type FrequencySnapshot = BTreeMap<String, ChannelStats>;

/// Mapping from poll epoch-seconds (stringified, as JSON object keys) to
/// per-frequency `(delta_correctable, delta_uncorrectable)` pairs
pub type EventHistory = BTreeMap<String, BTreeMap<String, (i64, i64)>>;

/// Build a frequency-keyed snapshot from scraped channel rows
pub fn snapshot_from_channels(channels: &[ChannelRecord]) -> FrequencySnapshot {
    channels
        .iter()
        .map(|chan| {
            (
                chan.frequency.clone(),
                ChannelStats {
                    channel_id: chan.channel_id,
                    power: chan.power,
                    snr: chan.snr,
                    correctable_err: chan.correctable_err,
                    uncorrectable_err: chan.uncorrectable_err,
                },
            )
        })
        .collect()
}

/// Durable cross-poll memory
///
/// Created once at cold start (loaded from storage or seeded from the first
/// live snapshot), mutated exactly once per poll by the delta tracker, and
/// persisted immediately afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "StateTuple", into = "StateTuple")]
pub struct PersistedState {
    /// Snapshot from the most recent successful poll, the zero-reference
    /// for delta computation
    pub baseline: FrequencySnapshot,
    /// Recorded anomalous-event deltas, keyed by poll time then frequency
    pub event_history: EventHistory,
    /// Epoch seconds of the device's last known boot
    pub previous_boot_time: i64,
    /// Device-reported uptime in seconds at the last poll
    pub previous_uptime: i64,
}

impl PersistedState {
    /// Seed fresh state from the first live snapshot (cold start)
    pub fn seed(baseline: FrequencySnapshot, boot_time: i64, uptime: i64) -> Self {
        Self {
            baseline,
            event_history: EventHistory::new(),
            previous_boot_time: boot_time,
            previous_uptime: uptime,
        }
    }
}

/// On-disk shape: an ordered 4-tuple, JSON-compatible with the format the
/// visualization component consumes
#[derive(Serialize, Deserialize)]
struct StateTuple(FrequencySnapshot, EventHistory, i64, i64);

impl From<StateTuple> for PersistedState {
    fn from(t: StateTuple) -> Self {
        Self {
            baseline: t.0,
            event_history: t.1,
            previous_boot_time: t.2,
            previous_uptime: t.3,
        }
    }
}

impl From<PersistedState> for StateTuple {
    fn from(s: PersistedState) -> Self {
        Self(
            s.baseline,
            s.event_history,
            s.previous_boot_time,
            s.previous_uptime,
        )
    }
}

/// Format an epoch timestamp as UTC ISO-8601 for log lines
///
/// Timestamps outside chrono's representable range fall back to the raw
/// number, which only matters for garbage scrape input.
pub fn iso_time(epoch: i64) -> String {
    match Utc.timestamp_opt(epoch, 0).single() {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => epoch.to_string(),
    }
}
