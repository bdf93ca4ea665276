//! Cross-poll delta tracking
//!
//! This is the stateful core of the monitor. Each poll it reconciles the
//! current frequency snapshot against the persisted baseline and classifies
//! the poll:
//!
//! - **Cold start** — no usable persisted state; seed the baseline, record
//!   nothing.
//! - **Reboot** — the device's boot time advanced past the jitter tolerance;
//!   counters are fresh and become the new zero-reference, no event.
//! - **Counter anomaly** — a counter decreased without a reboot signal (the
//!   device silently reset under critical errors); every frequency's
//!   baseline is reset and no event is recorded for this poll.
//! - **Normal** — nonzero deltas, disappearance markers, and newly appeared
//!   frequencies are recorded under the poll's timestamp.
//!
//! Whatever the classification, the baseline and boot/uptime memory are
//! replaced with the current observation at the end of the poll.

use crate::scrape::UptimeInfo;
use crate::types::{iso_time, FrequencySnapshot, PersistedState};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Tolerance for boot-time jitter, in seconds
///
/// On critical modem errors the reported boot time can drift back a few
/// seconds, and the uptime counter itself jitters slightly. Only an advance
/// beyond this window counts as a reboot.
const REBOOT_JITTER_SECS: i64 = 60;

/// Classification of a single poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// No prior state existed; the baseline was seeded from this poll
    ColdStart,
    /// Counters reconciled normally; `events` frequencies were recorded
    /// under this poll's timestamp (zero means a quiet poll)
    Normal {
        /// Number of per-frequency entries recorded for this poll
        events: usize,
    },
    /// The device rebooted; baseline reseeded, no event recorded
    Reboot {
        /// Boot epoch stored from the previous poll
        previous_boot_time: i64,
        /// Boot epoch observed this poll
        boot_time: i64,
    },
    /// A counter decreased without a reboot signal; all baselines reset,
    /// no event recorded
    CounterAnomaly,
}

/// The delta-tracking state machine
///
/// Owns the [`PersistedState`] for the lifetime of the process: constructed
/// once from whatever the store loaded, mutated exactly once per poll by
/// [`observe`](Self::observe), and handed to the store for saving after
/// each cycle.
pub struct DeltaTracker {
    state: Option<PersistedState>,
}

impl DeltaTracker {
    /// Creates a tracker from previously loaded state, or `None` for a cold
    /// start
    pub fn new(loaded: Option<PersistedState>) -> Self {
        Self { state: loaded }
    }

    /// Current state, available after the first observed poll
    pub fn state(&self) -> Option<&PersistedState> {
        self.state.as_ref()
    }

    /// Reconcile one poll's snapshot against the baseline
    ///
    /// Evaluates the state transition exactly once and unconditionally
    /// refreshes the baseline and boot/uptime memory before returning, so
    /// no branch can leave stale baseline data in place.
    pub fn observe(&mut self, snapshot: FrequencySnapshot, time: UptimeInfo) -> PollOutcome {
        let mut state = match self.state.take() {
            None => {
                info!(
                    channels = snapshot.len(),
                    boot_time = %iso_time(time.boot_time),
                    "No prior state, seeding baseline from current snapshot"
                );
                self.state = Some(PersistedState::seed(
                    snapshot,
                    time.boot_time,
                    time.uptime_secs,
                ));
                return PollOutcome::ColdStart;
            }
            Some(state) => state,
        };

        let outcome = if time.boot_time > state.previous_boot_time + REBOOT_JITTER_SECS {
            // Post-reboot counters are fresh and become the new zero-reference
            info!(
                boot_time = %iso_time(time.boot_time),
                uptime_secs = time.uptime_secs,
                previous_boot_time = %iso_time(state.previous_boot_time),
                previous_uptime_secs = state.previous_uptime,
                "Modem rebooted"
            );
            PollOutcome::Reboot {
                previous_boot_time: state.previous_boot_time,
                boot_time: time.boot_time,
            }
        } else if let Some(freq) = first_negative_delta(&state.baseline, &snapshot) {
            // Silent counter reset: the device resets without a reboot
            // signal when it sees enough critical errors. One bad frequency
            // resets the baseline for all of them.
            info!(
                frequency = %freq,
                "Negative error delta without reboot signal, resetting all baselines"
            );
            PollOutcome::CounterAnomaly
        } else {
            let events = collect_events(&state.baseline, &snapshot, time.system_time);
            let count = events.len();
            if !events.is_empty() {
                info!(
                    at = %iso_time(time.system_time),
                    entries = count,
                    "New errors recorded"
                );
                state
                    .event_history
                    .insert(time.system_time.to_string(), events);
            } else {
                debug!(at = %iso_time(time.system_time), "Quiet poll, nothing to record");
            }
            PollOutcome::Normal { events: count }
        };

        state.baseline = snapshot;
        state.previous_boot_time = time.boot_time;
        state.previous_uptime = time.uptime_secs;
        self.state = Some(state);
        outcome
    }
}

/// Signed counter delta between a current and baseline record
fn deltas(
    current: &crate::types::ChannelStats,
    baseline: &crate::types::ChannelStats,
) -> (i64, i64) {
    (
        current.correctable_err as i64 - baseline.correctable_err as i64,
        current.uncorrectable_err as i64 - baseline.uncorrectable_err as i64,
    )
}

/// First frequency whose counters decreased versus the baseline, if any
fn first_negative_delta(
    baseline: &FrequencySnapshot,
    snapshot: &FrequencySnapshot,
) -> Option<String> {
    baseline.iter().find_map(|(freq, base)| {
        let current = snapshot.get(freq)?;
        let (dc, du) = deltas(current, base);
        (dc < 0 || du < 0).then(|| freq.clone())
    })
}

/// Per-frequency entries to record for a normal poll
fn collect_events(
    baseline: &FrequencySnapshot,
    snapshot: &FrequencySnapshot,
    system_time: i64,
) -> BTreeMap<String, (i64, i64)> {
    let mut events = BTreeMap::new();

    for (freq, base) in baseline {
        match snapshot.get(freq) {
            Some(current) => {
                let (dc, du) = deltas(current, base);
                if dc != 0 || du != 0 {
                    events.insert(freq.clone(), (dc, du));
                }
            }
            None => {
                // Observational marker, not an error: the channel lineup
                // changed and this frequency is no longer utilized
                info!(frequency = %freq, at = %iso_time(system_time), "Channel no longer utilized");
                events.insert(freq.clone(), (0, 0));
            }
        }
    }

    // Newly appeared frequencies have no baseline to subtract against;
    // nonzero raw counters are recorded directly as the first delta
    for (freq, current) in snapshot {
        if !baseline.contains_key(freq)
            && (current.correctable_err != 0 || current.uncorrectable_err != 0)
        {
            events.insert(
                freq.clone(),
                (
                    current.correctable_err as i64,
                    current.uncorrectable_err as i64,
                ),
            );
        }
    }

    events
}
