//! Input-format disambiguation for raw epoch integers
//!
//! Upstream sources hand over bare integers that may be Unix microseconds,
//! Unix milliseconds, or an already-canonical micro-pulse total. The policy
//! here is explicit and ordered:
//!
//! 1. `raw >= 10^14` is Unix microseconds
//! 2. `raw` within ±5·10^11 of the epoch anchor (in ms) is Unix milliseconds
//! 3. anything else is a micro-pulse total
//!
//! It is only applied when a caller asks for it; `WallTime` values never go
//! through this path.

use crate::{MicroPulses, PulseCalendar, WallTime};

/// Lower bound for a raw value to be read as Unix microseconds
pub const UNIX_MICROS_THRESHOLD: i128 = 100_000_000_000_000;

/// Half-width of the window around the epoch anchor read as Unix milliseconds
pub const NEAR_EPOCH_MS_WINDOW: i128 = 500_000_000_000;

/// How a raw integer was interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochInputFormat {
    /// Microseconds since the Unix epoch
    UnixMicros,
    /// Milliseconds since the Unix epoch
    UnixMillis,
    /// Already a micro-pulse total
    MicroPulses,
}

impl EpochInputFormat {
    /// Classify a raw integer against a calendar's epoch anchor
    pub fn classify(raw: i128, calendar: &PulseCalendar) -> Self {
        let epoch_ms = calendar.config().epoch().as_millis() as i128;

        if raw >= UNIX_MICROS_THRESHOLD {
            EpochInputFormat::UnixMicros
        } else if raw.saturating_sub(epoch_ms).unsigned_abs() <= NEAR_EPOCH_MS_WINDOW as u128 {
            EpochInputFormat::UnixMillis
        } else {
            EpochInputFormat::MicroPulses
        }
    }
}

/// Normalize a raw integer to micro-pulses since the epoch anchor
pub fn normalize_raw_epoch(raw: i128, calendar: &PulseCalendar) -> (EpochInputFormat, MicroPulses) {
    let format = EpochInputFormat::classify(raw, calendar);
    let total = match format {
        EpochInputFormat::UnixMicros => {
            let micros = raw.min(i64::MAX as i128) as i64;
            calendar.micro_pulses_since_epoch(WallTime::from_micros(micros))
        }
        EpochInputFormat::UnixMillis => {
            // inside the window, so the value fits comfortably in i64
            calendar.micro_pulses_since_epoch(WallTime::from_millis(raw as i64))
        }
        EpochInputFormat::MicroPulses => MicroPulses(raw),
    };

    tracing::trace!(raw = %raw, ?format, total = %total.get(), "raw epoch normalized");
    (format, total)
}
