//! Display formatting for countdown values

use std::time::Duration;

/// Remaining time rendered for the fast presentation path
#[derive(Clone, Debug, PartialEq)]
pub struct RemainingText {
    /// Whole seconds, a dot, six fractional digits
    pub text: String,
    /// The same value in seconds
    pub secs: f64,
}

/// Render a remaining duration as `"S.ffffff"`
pub fn format_remaining(remaining: Duration) -> RemainingText {
    let micros = remaining.as_micros().min(u64::MAX as u128) as u64;
    let whole = micros / 1_000_000;
    let frac = (micros % 1_000_000).min(999_999);

    RemainingText {
        text: format!("{}.{:06}", whole, frac),
        secs: micros as f64 / 1_000_000.0,
    }
}

/// Same as [`format_remaining`] for a signed microsecond count; negatives read as zero
pub fn format_remaining_micros(micros: i128) -> RemainingText {
    let clamped = micros.clamp(0, u64::MAX as i128) as u64;
    format_remaining(Duration::from_micros(clamped))
}

/// Clamp into `[0, 1]`; NaN reads as zero
#[inline]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
