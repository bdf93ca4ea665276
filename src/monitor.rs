//! Signal-quality threshold checks
//!
//! Pure observation with no state: every channel on every poll is checked
//! against the configured SNR floor and power-magnitude ceiling, and
//! out-of-range values are logged. Runs independently of the delta tracker,
//! including on reboot and anomaly polls.

use crate::config::ThresholdConfig;
use crate::types::{iso_time, ChannelRecord};
use tracing::warn;

/// An out-of-range signal-quality observation
#[derive(Clone, Debug, PartialEq)]
pub enum SignalWarning {
    /// SNR fell below the configured floor
    LowSnr {
        /// Frequency of the offending channel
        frequency: String,
        /// The observed SNR in dB
        snr: f64,
    },
    /// Power magnitude exceeded the configured ceiling
    HighPower {
        /// Frequency of the offending channel
        frequency: String,
        /// The observed power in dBmV
        power: f64,
    },
}

/// Stateless threshold monitor
pub struct ThresholdMonitor {
    thresholds: ThresholdConfig,
}

impl ThresholdMonitor {
    /// Creates a monitor with the given thresholds
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    /// Check every channel, logging and returning any violations
    pub fn check(&self, channels: &[ChannelRecord], system_time: i64) -> Vec<SignalWarning> {
        let mut warnings = Vec::new();
        for chan in channels {
            if chan.snr < self.thresholds.min_snr {
                warn!(
                    at = %iso_time(system_time),
                    frequency = %chan.frequency,
                    snr = chan.snr,
                    min_snr = self.thresholds.min_snr,
                    "Channel SNR too low"
                );
                warnings.push(SignalWarning::LowSnr {
                    frequency: chan.frequency.clone(),
                    snr: chan.snr,
                });
            }
            if chan.power.abs() > self.thresholds.max_power {
                warn!(
                    at = %iso_time(system_time),
                    frequency = %chan.frequency,
                    power = chan.power,
                    max_power = self.thresholds.max_power,
                    "Channel power out of range"
                );
                warnings.push(SignalWarning::HighPower {
                    frequency: chan.frequency.clone(),
                    power: chan.power,
                });
            }
        }
        warnings
    }
}
