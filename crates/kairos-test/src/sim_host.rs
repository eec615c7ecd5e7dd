//! Simulated host - fake clocks and timers under test control
//!
//! Simulates:
//! - A monotonic clock that only moves when the test advances it
//! - A wall clock with configurable rate, steps and failures
//! - Frame callbacks that stop while the surface is hidden
//! - Timers that run normally, throttled or frozen
//! - Late timer delivery with seeded jitter

use std::sync::Arc;
use std::time::Duration;

use kairos_core::{KairosError, KairosResult, MonoTime, PulseConfig, WallTime};
use kairos_time::{
    DriverTag, FrameScheduler, HostHandle, MonotonicClock, OwnerId, ResumeSource, TimerMode,
    TimerScheduler, WakeQueue, WallClock,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How the wall clock relates to true elapsed time
#[derive(Clone, Debug, PartialEq)]
pub struct WallClockModel {
    /// Wall microseconds per true microsecond (1.0 = perfect)
    pub rate: f64,
    /// Accumulated manual steps, in microseconds
    pub step_us: i128,
}

impl WallClockModel {
    pub fn perfect() -> Self {
        WallClockModel { rate: 1.0, step_us: 0 }
    }

    /// Wall clock running fast by `ppm` parts per million
    pub fn fast(ppm: f64) -> Self {
        WallClockModel {
            rate: 1.0 + ppm / 1_000_000.0,
            step_us: 0,
        }
    }

    /// Wall clock running slow by `ppm` parts per million
    pub fn slow(ppm: f64) -> Self {
        Self::fast(-ppm)
    }

    fn offset_us(&self, elapsed_us: u64) -> i128 {
        (elapsed_us as f64 * self.rate).round() as i128 + self.step_us
    }
}

impl Default for WallClockModel {
    fn default() -> Self {
        Self::perfect()
    }
}

/// Counters for clock reads
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClockReads {
    pub mono: u64,
    pub wall: u64,
    pub mono_failures: u64,
    pub wall_failures: u64,
}

/// Everything the simulated host knows, shared by every [`SimHost`]
#[derive(Debug)]
pub struct SimWorld {
    pub queue: WakeQueue,
    /// True time since the simulation started
    elapsed: MonoTime,
    wall_base: WallTime,
    pub wall_model: WallClockModel,
    /// Subtracted from monotonic readings to model a broken monotonic clock
    mono_regression: Duration,
    mono_failures_left: u32,
    wall_failures_left: u32,
    mono_failing: bool,
    wall_failing: bool,
    timer_jitter: Duration,
    rng: StdRng,
    next_owner: OwnerId,
    pub reads: ClockReads,
}

impl SimWorld {
    pub fn new(wall_base: WallTime, frame_period: Duration, seed: u64) -> Self {
        SimWorld {
            queue: WakeQueue::new(frame_period),
            elapsed: MonoTime::ZERO,
            wall_base,
            wall_model: WallClockModel::perfect(),
            mono_regression: Duration::ZERO,
            mono_failures_left: 0,
            wall_failures_left: 0,
            mono_failing: false,
            wall_failing: false,
            timer_jitter: Duration::ZERO,
            rng: StdRng::seed_from_u64(seed),
            next_owner: 1,
            reads: ClockReads::default(),
        }
    }

    /// World whose wall clock starts on the pulse epoch
    pub fn at_epoch() -> Self {
        Self::new(PulseConfig::KKS.epoch(), Duration::from_millis(16), 0)
    }

    /// True elapsed time
    pub fn elapsed(&self) -> MonoTime {
        self.elapsed
    }

    /// Move true time forward; never backwards
    pub fn set_elapsed(&mut self, to: MonoTime) {
        self.elapsed = self.elapsed.max(to);
    }

    /// Wall time an ideal clock would show right now
    pub fn true_wall(&self) -> WallTime {
        self.wall_base.offset_micros(self.elapsed.as_micros() as i128)
    }

    /// Wall time the (possibly drifting or stepped) host clock shows
    pub fn host_wall(&self) -> WallTime {
        self.wall_base
            .offset_micros(self.wall_model.offset_us(self.elapsed.as_micros()))
    }

    pub fn host_mono(&self) -> MonoTime {
        MonoTime::from_micros(
            self.elapsed
                .as_micros()
                .saturating_sub(self.mono_regression.as_micros() as u64),
        )
    }

    /// Step the host wall clock (a user or NTP adjusting time)
    pub fn step_wall(&mut self, micros: i128) {
        self.wall_model.step_us += micros;
    }

    /// Make the monotonic clock read `by` earlier than before
    pub fn regress_mono(&mut self, by: Duration) {
        self.mono_regression += by;
    }

    pub fn fail_next_mono_reads(&mut self, count: u32) {
        self.mono_failures_left = count;
    }

    pub fn fail_next_wall_reads(&mut self, count: u32) {
        self.wall_failures_left = count;
    }

    pub fn set_mono_failing(&mut self, failing: bool) {
        self.mono_failing = failing;
    }

    pub fn set_wall_failing(&mut self, failing: bool) {
        self.wall_failing = failing;
    }

    /// Deliver timers up to `jitter` late
    pub fn set_timer_jitter(&mut self, jitter: Duration) {
        self.timer_jitter = jitter;
    }

    pub fn set_visible(&mut self, visible: bool) {
        let now = self.elapsed;
        self.queue.set_frames_enabled(visible, now);
    }

    pub fn set_timer_mode(&mut self, mode: TimerMode) {
        self.queue.set_timer_mode(mode);
    }

    /// Delivery time for a wake due at `due`, never past `limit`
    pub(crate) fn delivery_time(&mut self, due: MonoTime, limit: MonoTime) -> MonoTime {
        let jitter_us = self.timer_jitter.as_micros() as u64;
        let late = if jitter_us > 0 {
            self.rng.gen_range(0..=jitter_us)
        } else {
            0
        };
        MonoTime::from_micros(due.as_micros().saturating_add(late))
            .min(limit)
            .max(self.elapsed)
    }

    pub(crate) fn issue_owner(&mut self) -> OwnerId {
        let owner = self.next_owner;
        self.next_owner += 1;
        owner
    }

    fn read_mono(&mut self) -> KairosResult<MonoTime> {
        self.reads.mono += 1;
        if self.mono_failing || self.mono_failures_left > 0 {
            self.mono_failures_left = self.mono_failures_left.saturating_sub(1);
            self.reads.mono_failures += 1;
            return Err(KairosError::ClockReadFailure("simulated monotonic clock failure".into()));
        }
        Ok(self.host_mono())
    }

    fn read_wall(&mut self) -> KairosResult<WallTime> {
        self.reads.wall += 1;
        if self.wall_failing || self.wall_failures_left > 0 {
            self.wall_failures_left = self.wall_failures_left.saturating_sub(1);
            self.reads.wall_failures += 1;
            return Err(KairosError::ClockReadFailure("simulated wall clock failure".into()));
        }
        Ok(self.host_wall())
    }
}

/// Shared handle to a [`SimWorld`]
pub type SharedWorld = Arc<Mutex<SimWorld>>;

/// Host ports for one simulated component
#[derive(Clone, Debug)]
pub struct SimHost {
    world: SharedWorld,
    owner: OwnerId,
}

impl SimHost {
    pub(crate) fn new(world: SharedWorld, owner: OwnerId) -> Self {
        SimHost { world, owner }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn registrations(&self) -> usize {
        self.world.lock().queue.registrations_for(self.owner)
    }

    fn now(world: &SimWorld) -> MonoTime {
        world.elapsed
    }
}

impl MonotonicClock for SimHost {
    fn monotonic_now(&self) -> KairosResult<MonoTime> {
        self.world.lock().read_mono()
    }
}

impl WallClock for SimHost {
    fn wall_now(&self) -> KairosResult<WallTime> {
        self.world.lock().read_wall()
    }
}

impl FrameScheduler for SimHost {
    fn request_frame(&mut self, tag: DriverTag) -> HostHandle {
        let mut world = self.world.lock();
        let now = Self::now(&world);
        world.queue.add_frame(self.owner, tag, now)
    }

    fn cancel_frame(&mut self, handle: HostHandle) {
        self.world.lock().queue.cancel(handle);
    }
}

impl TimerScheduler for SimHost {
    fn set_interval(&mut self, period: Duration, tag: DriverTag) -> HostHandle {
        let mut world = self.world.lock();
        let now = Self::now(&world);
        world.queue.add_interval(self.owner, tag, now, period)
    }

    fn set_timeout(&mut self, delay: Duration, tag: DriverTag) -> HostHandle {
        let mut world = self.world.lock();
        let now = Self::now(&world);
        world.queue.add_timeout(self.owner, tag, now, delay)
    }

    fn clear_timer(&mut self, handle: HostHandle) {
        self.world.lock().queue.cancel(handle);
    }
}

impl ResumeSource for SimHost {
    fn subscribe_resume(&mut self, tag: DriverTag) -> HostHandle {
        self.world.lock().queue.add_resume(self.owner, tag)
    }

    fn unsubscribe_resume(&mut self, handle: HostHandle) {
        self.world.lock().queue.cancel(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> SimHost {
        let world = Arc::new(Mutex::new(SimWorld::at_epoch()));
        SimHost::new(world, 1)
    }

    #[test]
    fn test_clocks_follow_elapsed() {
        let host = host();
        host.world.lock().set_elapsed(MonoTime::from_millis(1500));

        assert_eq!(host.monotonic_now().unwrap(), MonoTime::from_millis(1500));
        assert_eq!(
            host.wall_now().unwrap(),
            PulseConfig::KKS.epoch() + Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_elapsed_never_goes_back() {
        let host = host();
        let mut world = host.world.lock();
        world.set_elapsed(MonoTime::from_millis(10));
        world.set_elapsed(MonoTime::from_millis(5));

        assert_eq!(world.elapsed(), MonoTime::from_millis(10));
    }

    #[test]
    fn test_fast_wall_clock() {
        let host = host();
        {
            let mut world = host.world.lock();
            world.wall_model = WallClockModel::fast(1000.0);
            world.set_elapsed(MonoTime::from_millis(10_000));
        }
        let wall = host.wall_now().unwrap();

        assert_eq!(
            wall.micros_since(PulseConfig::KKS.epoch()),
            10_010_000
        );
    }

    #[test]
    fn test_counted_failures() {
        let host = host();
        host.world.lock().fail_next_wall_reads(2);

        assert!(host.wall_now().is_err());
        assert!(host.wall_now().is_err());
        assert!(host.wall_now().is_ok());
        assert_eq!(host.world.lock().reads.wall_failures, 2);
    }

    #[test]
    fn test_mono_regression() {
        let host = host();
        {
            let mut world = host.world.lock();
            world.set_elapsed(MonoTime::from_millis(100));
            world.regress_mono(Duration::from_millis(40));
        }
        assert_eq!(host.monotonic_now().unwrap(), MonoTime::from_millis(60));
    }

    #[test]
    fn test_registrations_are_owned() {
        let mut host = host();
        host.set_interval(Duration::from_millis(33), DriverTag::new(1, kairos_time::DriverKind::Fallback));
        host.request_frame(DriverTag::new(1, kairos_time::DriverKind::Frame));

        assert_eq!(host.registrations(), 2);
    }
}
