//! Pulse configuration and calendar unit constants

use std::time::Duration;

use crate::{KairosError, KairosResult, WallTime};

/// Micro-pulses in one pulse
pub const MICRO_PER_PULSE: i128 = 1_000_000;

/// Micro-pulses in one day (17 491.270421 pulses)
pub const DAY_MICRO: i128 = 17_491_270_421;

/// Beats per day
pub const BEATS_PER_DAY: i128 = 36;

/// Micro-pulses in one beat, rounded once to an exact integer
pub const BEAT_MICRO: i128 = (DAY_MICRO + BEATS_PER_DAY / 2) / BEATS_PER_DAY;

/// Micro-pulses in one step (11 pulses)
pub const STEP_MICRO: i128 = 11_000_000;

/// Steps per beat
pub const STEPS_PER_BEAT: i128 = 44;

pub const DAYS_PER_WEEK: i128 = 6;
pub const DAYS_PER_MONTH: i128 = 42;
pub const MONTHS_PER_YEAR: i128 = 8;
pub const DAYS_PER_YEAR: i128 = DAYS_PER_MONTH * MONTHS_PER_YEAR;

/// Largest integer an IEEE-754 double represents exactly (2^53 - 1)
pub const SAFE_INTEGER_MAX: i64 = 9_007_199_254_740_991;
pub const SAFE_INTEGER_MIN: i64 = -SAFE_INTEGER_MAX;

/// Genesis instant of the pulse grid, 2024-05-10T06:45:41.888Z
pub const KKS_EPOCH_MS: i64 = 1_715_323_541_888;

/// Pulse duration truncated to whole milliseconds (3 + √5 s ≈ 5.236 s)
pub const KKS_PULSE_MS: u64 = 5236;

/// Process-wide pulse configuration
///
/// Immutable once built; shared by value between every calendar and
/// scheduler instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseConfig {
    /// Epoch anchor all pulse counting starts from
    epoch: WallTime,
    /// Pulse duration in whole milliseconds
    pulse_ms: u64,
}

impl PulseConfig {
    /// Canonical Kairos configuration
    pub const KKS: PulseConfig = PulseConfig {
        epoch: WallTime(KKS_EPOCH_MS * 1000),
        pulse_ms: KKS_PULSE_MS,
    };

    /// Build a configuration with a custom anchor and pulse length
    pub fn new(epoch: WallTime, pulse: Duration) -> KairosResult<Self> {
        if pulse < Duration::from_millis(1) {
            return Err(KairosError::InvalidConfig(format!(
                "pulse duration must be at least 1ms, got {:?}",
                pulse
            )));
        }
        if pulse.subsec_nanos() % 1_000_000 != 0 {
            return Err(KairosError::InvalidConfig(format!(
                "pulse duration must be whole milliseconds, got {:?}",
                pulse
            )));
        }

        let pulse_ms = pulse.as_millis();
        if pulse_ms > i64::MAX as u128 / 1000 {
            return Err(KairosError::InvalidConfig(format!(
                "pulse duration too large: {:?}",
                pulse
            )));
        }

        Ok(PulseConfig {
            epoch,
            pulse_ms: pulse_ms as u64,
        })
    }

    #[inline]
    pub fn epoch(&self) -> WallTime {
        self.epoch
    }

    #[inline]
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }

    #[inline]
    pub fn pulse_ms(&self) -> u64 {
        self.pulse_ms
    }

    #[inline]
    pub fn pulse_micros(&self) -> i128 {
        self.pulse_ms as i128 * 1000
    }

    #[inline]
    pub fn pulse_secs_f64(&self) -> f64 {
        self.pulse_ms as f64 / 1000.0
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        PulseConfig::KKS
    }
}
