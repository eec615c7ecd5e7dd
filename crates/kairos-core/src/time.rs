//! Time primitives for Kairos pulse time
//!
//! Two clocks meet in the scheduler:
//! - Wall time: absolute, comparable with the epoch anchor, may jump
//! - Monotonic time: local, smooth, only used to interpolate between truth samples

use std::ops::{Add, Sub};
use std::time::Duration;

/// Wall-clock instant
/// Represented as microseconds since the Unix epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WallTime(pub i64);

impl WallTime {
    pub const UNIX_EPOCH: WallTime = WallTime(0);
    pub const MAX: WallTime = WallTime(i64::MAX);
    pub const MIN: WallTime = WallTime(i64::MIN);

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        WallTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        WallTime(millis.saturating_mul(1000))
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    /// Whole milliseconds, floored
    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0.div_euclid(1000)
    }

    #[inline]
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Signed distance `self - earlier` in microseconds
    #[inline]
    pub fn micros_since(self, earlier: WallTime) -> i128 {
        self.0 as i128 - earlier.0 as i128
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        WallTime(self.0.saturating_add(duration_micros_i64(duration)))
    }

    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        WallTime(self.0.saturating_sub(duration_micros_i64(duration)))
    }

    /// Offset by a signed number of microseconds, saturating at the bounds
    #[inline]
    pub fn offset_micros(self, micros: i128) -> Self {
        let sum = self.0 as i128 + micros;
        WallTime(sum.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

impl Add<Duration> for WallTime {
    type Output = WallTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Duration> for WallTime {
    type Output = WallTime;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sub<WallTime> for WallTime {
    type Output = Duration;

    /// Unsigned distance; zero when `rhs` is later
    #[inline]
    fn sub(self, rhs: WallTime) -> Self::Output {
        let diff = self.micros_since(rhs);
        if diff > 0 {
            Duration::from_micros(diff.min(u64::MAX as i128) as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for WallTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wall({:.3}ms)", self.as_millis_f64())
    }
}

/// Monotonic reading - smooth, local, never decreasing on a healthy host
/// Represented as microseconds since host start
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MonoTime(pub u64);

impl MonoTime {
    pub const ZERO: MonoTime = MonoTime(0);

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        MonoTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        MonoTime(millis.saturating_mul(1000))
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        MonoTime(self.0.saturating_add(duration.as_micros().min(u64::MAX as u128) as u64))
    }

    /// Elapsed time since `earlier`, or `None` if the reading went backwards
    #[inline]
    pub fn elapsed_since(self, earlier: MonoTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_micros)
    }
}

impl Add<Duration> for MonoTime {
    type Output = MonoTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<MonoTime> for MonoTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: MonoTime) -> Self::Output {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Debug for MonoTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mono({:.3}ms)", self.as_millis_f64())
    }
}

#[inline]
pub(crate) fn duration_micros_i64(duration: Duration) -> i64 {
    duration.as_micros().min(i64::MAX as u128) as i64
}
