//! Pulse calendar - exact conversion from wall-clock instants to pulse units
//!
//! All arithmetic runs on `i128` micro-pulses with Euclidean division, so
//! instants before the epoch floor consistently and no intermediate value
//! passes through floating point. Narrowing to display integers saturates
//! at the exact-integer range of an `f64`.

use std::time::Duration;

use crate::{
    KairosError, PulseConfig, WallTime, BEATS_PER_DAY, BEAT_MICRO, DAYS_PER_MONTH,
    DAYS_PER_WEEK, DAYS_PER_YEAR, DAY_MICRO, MICRO_PER_PULSE, MONTHS_PER_YEAR,
    SAFE_INTEGER_MAX, SAFE_INTEGER_MIN, STEPS_PER_BEAT, STEP_MICRO,
};

/// Exact micro-pulse count since the epoch anchor
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MicroPulses(pub i128);

impl MicroPulses {
    pub const ZERO: MicroPulses = MicroPulses(0);

    #[inline]
    pub fn from_pulses(pulses: i128) -> Self {
        MicroPulses(pulses.saturating_mul(MICRO_PER_PULSE))
    }

    #[inline]
    pub fn get(self) -> i128 {
        self.0
    }

    /// Whole pulses elapsed, floored toward negative infinity
    #[inline]
    pub fn pulse_index(self) -> i128 {
        self.0.div_euclid(MICRO_PER_PULSE)
    }

    /// Position within the current pulse, in `[0, 1)`
    #[inline]
    pub fn sub_pulse_fraction(self) -> f64 {
        self.0.rem_euclid(MICRO_PER_PULSE) as f64 / MICRO_PER_PULSE as f64
    }

    /// Whole days elapsed since the epoch
    #[inline]
    pub fn day_index(self) -> i128 {
        self.0.div_euclid(DAY_MICRO)
    }

    pub fn calendar_position(self) -> CalendarPosition {
        let day_idx = self.day_index();
        let in_day = self.0.rem_euclid(DAY_MICRO);

        let beat = (in_day / BEAT_MICRO).clamp(0, BEATS_PER_DAY - 1);
        let in_beat = in_day - beat * BEAT_MICRO;
        // the last beat is ~1.87M micro-pulses longer than 44 steps
        let step = (in_beat / STEP_MICRO).clamp(0, STEPS_PER_BEAT - 1);

        let weekday = day_idx.rem_euclid(DAYS_PER_WEEK);
        let day_of_month = day_idx.rem_euclid(DAYS_PER_MONTH) + 1;
        let month = day_idx.div_euclid(DAYS_PER_MONTH).rem_euclid(MONTHS_PER_YEAR) + 1;
        let year = narrow_saturating(day_idx.div_euclid(DAYS_PER_YEAR));

        CalendarPosition {
            weekday: weekday as u8,
            beat: beat as u8,
            step: step as u8,
            day_of_month: day_of_month as u8,
            month: month as u8,
            year,
        }
    }
}

/// Calendar fields derived from a micro-pulse total
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CalendarPosition {
    /// Day of the 6-day week, 0..=5
    pub weekday: u8,
    /// Beat of the day, 0..=35
    pub beat: u8,
    /// Step within the beat, 0..=43
    pub step: u8,
    /// Day of the 42-day month, 1..=42
    pub day_of_month: u8,
    /// Month of the 8-month year, 1..=8
    pub month: u8,
    /// Years since the epoch, saturated to the exact-integer range
    pub year: i64,
}

impl CalendarPosition {
    /// `beat:step` with the step zero-padded, e.g. `"12:07"`
    pub fn beat_step_label(&self) -> String {
        format!("{}:{:02}", self.beat, self.step)
    }
}

/// Narrow an exact integer for display, clamping to the safe-integer range
pub fn narrow_saturating(value: i128) -> i64 {
    match try_narrow(value) {
        Ok(v) => v,
        Err(KairosError::ArithmeticOverflowGuard { clamped, .. }) => {
            tracing::debug!(value = %value, clamped, "exact integer clamped for display");
            clamped
        }
        Err(_) => 0,
    }
}

/// Narrow an exact integer, reporting when it falls outside the safe range
pub fn try_narrow(value: i128) -> Result<i64, KairosError> {
    if value > SAFE_INTEGER_MAX as i128 {
        Err(KairosError::ArithmeticOverflowGuard {
            value,
            clamped: SAFE_INTEGER_MAX,
        })
    } else if value < SAFE_INTEGER_MIN as i128 {
        Err(KairosError::ArithmeticOverflowGuard {
            value,
            clamped: SAFE_INTEGER_MIN,
        })
    } else {
        Ok(value as i64)
    }
}

fn clamp_wall(micros: i128) -> WallTime {
    if micros > i64::MAX as i128 || micros < i64::MIN as i128 {
        tracing::debug!(micros = %micros, "wall time saturated");
    }
    WallTime(micros.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
}

/// Pulse calendar bound to one epoch anchor and pulse duration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PulseCalendar {
    config: PulseConfig,
}

impl PulseCalendar {
    pub fn new(config: PulseConfig) -> Self {
        PulseCalendar { config }
    }

    #[inline]
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Exact micro-pulse count between the epoch anchor and `instant`
    pub fn micro_pulses_since_epoch(&self, instant: WallTime) -> MicroPulses {
        let delta_us = instant.micros_since(self.config.epoch());
        // |delta_us| < 2^64, so the product stays far inside i128
        MicroPulses((delta_us * MICRO_PER_PULSE).div_euclid(self.config.pulse_micros()))
    }

    #[inline]
    pub fn pulse_index_from_micro_pulses(&self, total: MicroPulses) -> i128 {
        total.pulse_index()
    }

    #[inline]
    pub fn calendar_position_from_micro_pulses(&self, total: MicroPulses) -> CalendarPosition {
        total.calendar_position()
    }

    /// Wall-clock instant of a micro-pulse total, floored to the microsecond
    pub fn wall_time_from_micro_pulses(&self, total: MicroPulses) -> WallTime {
        let offset = total
            .0
            .checked_mul(self.config.pulse_micros())
            .map(|scaled| scaled.div_euclid(MICRO_PER_PULSE));

        match offset {
            Some(offset) => clamp_wall(self.config.epoch().as_micros() as i128 + offset),
            None if total.0 > 0 => WallTime::MAX,
            None => WallTime::MIN,
        }
    }

    /// Wall-clock instant of the first boundary after `total`
    pub fn next_boundary_from(&self, total: MicroPulses) -> WallTime {
        let next = total.pulse_index() + 1;
        match next.checked_mul(self.config.pulse_micros()) {
            Some(offset) => clamp_wall(self.config.epoch().as_micros() as i128 + offset),
            None if next > 0 => WallTime::MAX,
            None => WallTime::MIN,
        }
    }

    /// Time left until the next boundary as seen from `now`
    pub fn remaining_from(&self, now: WallTime) -> Duration {
        self.next_boundary_from(self.micro_pulses_since_epoch(now)) - now
    }

    /// Convenience: pulse index at a wall-clock instant
    pub fn pulse_index_at(&self, instant: WallTime) -> i128 {
        self.micro_pulses_since_epoch(instant).pulse_index()
    }

    /// Convenience: calendar position at a wall-clock instant
    pub fn position_at(&self, instant: WallTime) -> CalendarPosition {
        self.micro_pulses_since_epoch(instant).calendar_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kks() -> PulseCalendar {
        PulseCalendar::default()
    }

    fn at_ms(offset_ms: i64) -> WallTime {
        PulseConfig::KKS.epoch().offset_micros(offset_ms as i128 * 1000)
    }

    #[test]
    fn test_epoch_resolves_to_zero() {
        let cal = kks();
        let total = cal.micro_pulses_since_epoch(PulseConfig::KKS.epoch());

        assert_eq!(total, MicroPulses::ZERO);
        assert_eq!(cal.pulse_index_from_micro_pulses(total), 0);

        let pos = cal.calendar_position_from_micro_pulses(total);
        assert_eq!((pos.weekday, pos.beat, pos.step), (0, 0, 0));
        assert_eq!((pos.day_of_month, pos.month, pos.year), (1, 1, 0));
    }

    #[test]
    fn test_next_boundary_round_trip() {
        let cal = kks();
        let epoch = PulseConfig::KKS.epoch();
        let total = cal.micro_pulses_since_epoch(epoch);

        assert_eq!(cal.next_boundary_from(total), epoch + Duration::from_millis(5236));
    }

    #[test]
    fn test_pulse_boundaries() {
        let cal = kks();

        assert_eq!(cal.pulse_index_at(at_ms(5235)), 0);
        assert_eq!(cal.pulse_index_at(at_ms(5236)), 1);
        assert_eq!(cal.micro_pulses_since_epoch(at_ms(2618)), MicroPulses(500_000));
        assert_eq!(cal.remaining_from(at_ms(2618)), Duration::from_millis(2618));
    }

    #[test]
    fn test_before_epoch_floors() {
        let cal = kks();

        // one millisecond early is still the previous pulse, not pulse zero
        assert_eq!(cal.pulse_index_at(at_ms(-1)), -1);
        assert_eq!(cal.pulse_index_at(at_ms(-5236)), -1);
        assert_eq!(cal.pulse_index_at(at_ms(-5237)), -2);

        let total = cal.micro_pulses_since_epoch(at_ms(-1));
        assert_eq!(cal.next_boundary_from(total), PulseConfig::KKS.epoch());

        let pos = cal.position_at(at_ms(-1));
        assert_eq!(pos.weekday, 5);
        assert_eq!(pos.beat, 35);
        assert_eq!(pos.step, 43);
        assert_eq!((pos.day_of_month, pos.month, pos.year), (42, 8, -1));
    }

    #[test]
    fn test_day_rollover() {
        let day = MicroPulses(DAY_MICRO);
        let pos = day.calendar_position();
        assert_eq!((pos.weekday, pos.beat, pos.step, pos.day_of_month), (1, 0, 0, 2));

        let last = MicroPulses(DAY_MICRO - 1).calendar_position();
        assert_eq!((last.weekday, last.beat, last.step), (0, 35, 43));
    }

    #[test]
    fn test_month_and_year() {
        let month = MicroPulses(DAY_MICRO * DAYS_PER_MONTH).calendar_position();
        assert_eq!((month.day_of_month, month.month, month.year), (1, 2, 0));

        let year = MicroPulses(DAY_MICRO * DAYS_PER_YEAR).calendar_position();
        assert_eq!((year.day_of_month, year.month, year.year), (1, 1, 1));
    }

    #[test]
    fn test_beat_step_label() {
        let total = MicroPulses(BEAT_MICRO * 12 + STEP_MICRO * 7 + 3);
        assert_eq!(total.calendar_position().beat_step_label(), "12:07");
    }

    #[test]
    fn test_extreme_totals_saturate() {
        let cal = kks();

        assert_eq!(cal.next_boundary_from(MicroPulses(i128::MAX)), WallTime::MAX);
        assert_eq!(cal.next_boundary_from(MicroPulses(i128::MIN)), WallTime::MIN);
        assert_eq!(cal.wall_time_from_micro_pulses(MicroPulses(i128::MAX)), WallTime::MAX);

        let pos = MicroPulses(i128::MAX).calendar_position();
        assert_eq!(pos.year, SAFE_INTEGER_MAX);
        let pos = MicroPulses(i128::MIN).calendar_position();
        assert_eq!(pos.year, SAFE_INTEGER_MIN);
    }

    #[test]
    fn test_far_future_comparisons_stay_exact() {
        let cal = kks();
        let far = WallTime::MAX;
        let total = cal.micro_pulses_since_epoch(far);

        // past the f64-exact range, but ordering is still exact
        assert!(total.get() > SAFE_INTEGER_MAX as i128);
        assert!(cal.micro_pulses_since_epoch(far.offset_micros(-1)) <= total);
        assert_eq!(narrow_saturating(total.get()), SAFE_INTEGER_MAX);
        assert_eq!(narrow_saturating(total.pulse_index()) as i128, total.pulse_index());
    }

    #[test]
    fn test_try_narrow_reports_guard() {
        assert_eq!(try_narrow(42), Ok(42));
        assert!(matches!(
            try_narrow(SAFE_INTEGER_MAX as i128 + 1),
            Err(KairosError::ArithmeticOverflowGuard { clamped: SAFE_INTEGER_MAX, .. })
        ));
    }

    #[test]
    fn test_wall_time_inverse() {
        let cal = kks();
        let t = at_ms(123_456_789);
        let back = cal.wall_time_from_micro_pulses(cal.micro_pulses_since_epoch(t));

        assert!(back <= t);
        assert!(t.micros_since(back) <= 6);
    }

    proptest! {
        #[test]
        fn prop_pulse_index_monotonic(offset_ms in -10_000_000_000_000i64..10_000_000_000_000i64) {
            let cal = kks();
            let t = at_ms(offset_ms);
            prop_assert!(cal.pulse_index_at(t) <= cal.pulse_index_at(t + Duration::from_millis(1)));
        }

        #[test]
        fn prop_position_in_bounds(total in any::<i128>()) {
            let pos = MicroPulses(total).calendar_position();
            prop_assert!(pos.weekday <= 5);
            prop_assert!(pos.beat <= 35);
            prop_assert!(pos.step <= 43);
            prop_assert!((1..=42).contains(&pos.day_of_month));
            prop_assert!((1..=8).contains(&pos.month));
        }

        #[test]
        fn prop_next_boundary_is_ahead(micros in (i64::MIN / 4)..(i64::MAX / 4)) {
            let cal = kks();
            let now = WallTime::from_micros(micros);
            let next = cal.next_boundary_from(cal.micro_pulses_since_epoch(now));

            prop_assert!(next > now);
            prop_assert!(next.micros_since(now) <= cal.config().pulse_micros());
        }
    }
}
