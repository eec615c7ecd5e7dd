//! Breath cadence - phase-locked repeating work for coarse UI updates
//!
//! Cadence only; pulse math lives in `kairos_core`. A [`BreathLoop`] re-locks
//! to the breath grid after every tick, so timer lateness never accumulates.

use std::time::Duration;

use kairos_core::{WallTime, KKS_PULSE_MS};

use crate::{DriverKind, DriverTag, HostHandle, TimerScheduler, WallClock, Wakeable};

/// Alignment parameters for [`ms_until_next_breath`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreathAlign {
    /// Breath length; whole milliseconds, at least one
    pub breath: Duration,
    /// Phase origin the breath grid is aligned to
    pub origin: WallTime,
    /// Lower bound on any returned delay
    pub min_delay: Duration,
    /// Added to every delay so timers do not fire just before the boundary
    pub pad: Duration,
}

impl Default for BreathAlign {
    fn default() -> Self {
        BreathAlign {
            breath: Duration::from_millis(KKS_PULSE_MS),
            origin: WallTime::UNIX_EPOCH,
            min_delay: Duration::from_millis(10),
            pad: Duration::from_millis(6),
        }
    }
}

impl BreathAlign {
    /// Align to the pulse calendar's own epoch
    pub fn pulse_locked() -> Self {
        BreathAlign {
            origin: kairos_core::PulseConfig::KKS.epoch(),
            ..Self::default()
        }
    }
}

/// Delay from `now` until the next breath boundary, padded and clamped
///
/// Exactly on a boundary the next full breath is returned.
pub fn ms_until_next_breath(now: WallTime, align: &BreathAlign) -> Duration {
    let breath = (align.breath.as_millis() as i64).max(1);
    let rel = now.as_millis().saturating_sub(align.origin.as_millis());
    let into = rel.rem_euclid(breath);

    let delay = Duration::from_millis((breath - into) as u64) + align.pad;
    delay.max(align.min_delay)
}

/// Work run on every breath
pub trait BreathHandler {
    fn on_breath(&mut self, at: WallTime);
}

impl<F: FnMut(WallTime)> BreathHandler for F {
    fn on_breath(&mut self, at: WallTime) {
        self(at)
    }
}

/// Re-arming one-shot that calls its handler on each breath boundary
pub struct BreathLoop<H, B> {
    host: H,
    handler: B,
    align: BreathAlign,
    run: u64,
    running: bool,
    timer: Option<HostHandle>,
    breaths: u64,
}

impl<H, B> BreathLoop<H, B>
where
    H: WallClock + TimerScheduler,
    B: BreathHandler,
{
    pub fn new(host: H, handler: B, align: BreathAlign) -> Self {
        BreathLoop {
            host,
            handler,
            align,
            run: 0,
            running: false,
            timer: None,
            breaths: 0,
        }
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.run += 1;
        self.running = true;
        self.schedule();
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        if let Some(h) = self.timer.take() {
            self.host.clear_timer(h);
        }
        self.run += 1;
        self.running = false;
    }

    fn schedule(&mut self) {
        if let Some(h) = self.timer.take() {
            self.host.clear_timer(h);
        }
        let delay = match self.host.wall_now() {
            Ok(now) => ms_until_next_breath(now, &self.align),
            Err(e) => {
                tracing::warn!(error = %e, "wall clock unavailable, scheduling one unaligned breath");
                self.align.breath.max(self.align.min_delay)
            }
        };
        let tag = DriverTag::new(self.run, DriverKind::Breath);
        self.timer = Some(self.host.set_timeout(delay, tag));
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn breaths(&self) -> u64 {
        self.breaths
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn handler(&self) -> &B {
        &self.handler
    }
}

impl<H, B> Wakeable for BreathLoop<H, B>
where
    H: WallClock + TimerScheduler,
    B: BreathHandler,
{
    fn handle_wake(&mut self, tag: DriverTag) {
        if !self.running || tag.run != self.run || tag.kind != DriverKind::Breath {
            return;
        }
        self.timer = None;
        self.breaths += 1;

        match self.host.wall_now() {
            Ok(at) => self.handler.on_breath(at),
            Err(e) => tracing::warn!(error = %e, "breath skipped"),
        }
        self.schedule();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WakeQueue;
    use kairos_core::{KairosResult, MonoTime};

    fn at_ms(ms: i64) -> WallTime {
        WallTime::from_millis(ms)
    }

    #[test]
    fn test_delay_to_next_breath() {
        let align = BreathAlign::default();

        assert_eq!(ms_until_next_breath(at_ms(1000), &align), Duration::from_millis(4236 + 6));
        assert_eq!(ms_until_next_breath(at_ms(5235), &align), Duration::from_millis(1 + 6));
    }

    #[test]
    fn test_exact_boundary_waits_full_breath() {
        let align = BreathAlign::default();
        assert_eq!(ms_until_next_breath(at_ms(5236 * 7), &align), Duration::from_millis(5236 + 6));
    }

    #[test]
    fn test_min_delay_and_origin() {
        let align = BreathAlign {
            pad: Duration::ZERO,
            origin: at_ms(3),
            ..BreathAlign::default()
        };
        // 2 ms to the boundary at 5239, clamped up to 10
        assert_eq!(ms_until_next_breath(at_ms(5237), &align), Duration::from_millis(10));
        // before the origin still aligns
        assert_eq!(ms_until_next_breath(at_ms(0), &align), Duration::from_millis(10));
        assert_eq!(ms_until_next_breath(at_ms(-100), &align), Duration::from_millis(103));
    }

    #[test]
    fn test_pulse_locked_origin() {
        let align = BreathAlign::pulse_locked();
        let now = align.origin + Duration::from_millis(5236 * 100 + 236);

        assert_eq!(ms_until_next_breath(now, &align), Duration::from_millis(5000 + 6));
    }

    struct Host {
        queue: WakeQueue,
        now: MonoTime,
    }

    impl WallClock for Host {
        fn wall_now(&self) -> KairosResult<WallTime> {
            Ok(WallTime::from_micros(self.now.as_micros() as i64))
        }
    }

    impl TimerScheduler for Host {
        fn set_interval(&mut self, period: Duration, tag: DriverTag) -> HostHandle {
            self.queue.add_interval(0, tag, self.now, period)
        }

        fn set_timeout(&mut self, delay: Duration, tag: DriverTag) -> HostHandle {
            self.queue.add_timeout(0, tag, self.now, delay)
        }

        fn clear_timer(&mut self, handle: HostHandle) {
            self.queue.cancel(handle);
        }
    }

    #[test]
    fn test_loop_relocks_each_breath() {
        let host = Host {
            queue: WakeQueue::new(Duration::from_millis(16)),
            now: MonoTime::from_millis(1000),
        };
        let mut fired = Vec::new();
        let mut breath = BreathLoop::new(host, |at: WallTime| fired.push(at.as_millis()), BreathAlign::default());
        breath.start();

        let end = MonoTime::from_millis(5236 * 4);
        while let Some(due) = breath.host_mut().queue.pop_due(end) {
            breath.host_mut().now = due.at;
            breath.handle_wake(due.tag);
        }
        assert_eq!(breath.breaths(), 3);
        assert_eq!(breath.host().queue.len(), 1);

        breath.stop();
        assert!(breath.host().queue.is_empty());
        drop(breath);
        assert_eq!(fired, vec![5236 + 6, 5236 * 2 + 6, 5236 * 3 + 6]);
    }

    proptest::proptest! {
        #[test]
        fn prop_delay_lands_on_grid(now_ms in -10_000_000_000i64..10_000_000_000) {
            let align = BreathAlign::pulse_locked();
            let delay = ms_until_next_breath(at_ms(now_ms), &align);

            proptest::prop_assert!(delay >= align.min_delay);
            proptest::prop_assert!(delay <= align.breath + align.pad);

            if delay > align.min_delay {
                let fire = now_ms + (delay - align.pad).as_millis() as i64;
                let rel = fire - align.origin.as_millis();
                proptest::prop_assert_eq!(rel.rem_euclid(5236), 0);
            }
        }
    }
}
