//! Truth snapshots - ground truth re-derived from the pulse calendar

use std::time::Duration;

use kairos_core::{KairosError, KairosResult, MonoTime, PulseCalendar, WallTime};

/// Pairing of a wall-clock truth sample with the monotonic reading taken
/// alongside it, plus the next pulse boundary
///
/// Owned by exactly one scheduler; interpolation between snapshots only
/// ever reads from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TruthSnapshot {
    anchor_wall: WallTime,
    anchor_mono: MonoTime,
    next_boundary: WallTime,
}

impl TruthSnapshot {
    /// Build a snapshot, rejecting a boundary that is not ahead of the
    /// anchor by at most one pulse
    pub fn new(
        anchor_wall: WallTime,
        anchor_mono: MonoTime,
        next_boundary: WallTime,
        pulse: Duration,
    ) -> KairosResult<Self> {
        let gap = next_boundary.micros_since(anchor_wall);
        if gap <= 0 {
            return Err(KairosError::InvalidSnapshot(format!(
                "next boundary {:?} is not after anchor {:?}",
                next_boundary, anchor_wall
            )));
        }
        if gap > pulse.as_micros() as i128 {
            return Err(KairosError::InvalidSnapshot(format!(
                "next boundary {:?} is more than one pulse past anchor {:?}",
                next_boundary, anchor_wall
            )));
        }

        Ok(TruthSnapshot {
            anchor_wall,
            anchor_mono,
            next_boundary,
        })
    }

    /// Derive a snapshot from a wall-clock reading
    ///
    /// The boundary comes from the exact micro-pulse total; the anchor keeps
    /// the raw reading so interpolation never loses sub-pulse precision.
    pub fn take(calendar: &PulseCalendar, wall: WallTime, mono: MonoTime) -> KairosResult<Self> {
        let total = calendar.micro_pulses_since_epoch(wall);
        let next_boundary = calendar.next_boundary_from(total);
        if next_boundary == WallTime::MAX || next_boundary == WallTime::MIN {
            return Err(KairosError::InvalidSnapshot(format!(
                "next boundary saturated for reading {:?}",
                wall
            )));
        }

        Self::new(wall, mono, next_boundary, calendar.config().pulse())
    }

    #[inline]
    pub fn anchor_wall(&self) -> WallTime {
        self.anchor_wall
    }

    #[inline]
    pub fn anchor_mono(&self) -> MonoTime {
        self.anchor_mono
    }

    #[inline]
    pub fn next_boundary(&self) -> WallTime {
        self.next_boundary
    }

    /// Interpolated wall-clock estimate for a monotonic reading
    pub fn estimate_wall(&self, mono: MonoTime) -> KairosResult<WallTime> {
        let elapsed = mono.elapsed_since(self.anchor_mono).ok_or_else(|| {
            KairosError::InvalidSnapshot(format!(
                "monotonic reading {:?} precedes anchor {:?}",
                mono, self.anchor_mono
            ))
        })?;
        Ok(self.anchor_wall.saturating_add(elapsed))
    }

    /// Move the stored boundary past `estimate` by whole pulses
    ///
    /// Returns the number of boundaries crossed (zero when `estimate` is
    /// still before the boundary).
    pub fn advance_boundary(&mut self, estimate: WallTime, pulse: Duration) -> u64 {
        if estimate < self.next_boundary {
            return 0;
        }

        let pulse_us = pulse.as_micros() as i128;
        let over = estimate.micros_since(self.next_boundary);
        let missed = over / pulse_us + 1;
        self.next_boundary = self.next_boundary.offset_micros(missed * pulse_us);

        missed.min(u64::MAX as i128) as u64
    }
}
