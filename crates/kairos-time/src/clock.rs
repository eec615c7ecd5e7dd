//! Clock implementations backed by the operating system

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use kairos_core::{KairosError, KairosResult, MonoTime, WallTime};

use crate::{MonotonicClock, WallClock};

/// Monotonic + wall clock pair read from the OS
///
/// Monotonic readings count from construction, like a page's
/// `performance.now()`.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    /// Reference for monotonic readings
    reference: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            reference: Instant::now(),
        }
    }

    /// Monotonic reading for an arbitrary instant taken from the same process
    pub fn mono_at(&self, instant: Instant) -> MonoTime {
        let elapsed = instant.saturating_duration_since(self.reference);
        MonoTime::from_micros(elapsed.as_micros().min(u64::MAX as u128) as u64)
    }

    /// Instant corresponding to a monotonic reading
    pub fn instant_at(&self, mono: MonoTime) -> Instant {
        self.reference + std::time::Duration::from_micros(mono.as_micros())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn monotonic_now(&self) -> KairosResult<MonoTime> {
        Ok(self.mono_at(Instant::now()))
    }
}

impl WallClock for SystemClock {
    fn wall_now(&self) -> KairosResult<WallTime> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| KairosError::ClockReadFailure(format!("system time before Unix epoch: {}", e)))?;

        let micros = i64::try_from(since_epoch.as_micros())
            .map_err(|_| KairosError::ClockReadFailure("system time out of range".into()))?;
        Ok(WallTime::from_micros(micros))
    }
}
