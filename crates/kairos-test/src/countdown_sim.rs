//! Countdown simulator - drives components against a simulated host
//!
//! Simulates:
//! - Frame, fallback and resync drivers on a fake clock
//! - Backgrounded and sleeping surfaces
//! - Drifting, stepped and failing clocks
//! - Late timer delivery

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kairos_core::{MonoTime, PulseCalendar, WallTime};
use kairos_time::{CountdownScheduler, OwnerId, SchedulerConfig, TimerMode, Wakeable};
use parking_lot::Mutex;
use thiserror::Error;

use crate::{RecordingFastPath, RecordingObserver, SharedWorld, SimHost, SimWorld};

/// Wakes allowed at a single instant before the run is declared runaway
const MAX_WAKES_PER_INSTANT: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("{count} wakes dispatched at {at:?} without time advancing")]
    WakeStorm { at: MonoTime, count: usize },
}

/// A component the harness can wake
pub type SimComponent = Arc<Mutex<dyn Wakeable + Send>>;

/// Deterministic event loop over a [`SimWorld`]
///
/// The world lock is never held while a component runs.
pub struct SimHarness {
    world: SharedWorld,
    components: BTreeMap<OwnerId, SimComponent>,
    delivered: u64,
}

impl SimHarness {
    pub fn new(world: SimWorld) -> Self {
        SimHarness {
            world: Arc::new(Mutex::new(world)),
            components: BTreeMap::new(),
            delivered: 0,
        }
    }

    pub fn at_epoch() -> Self {
        Self::new(SimWorld::at_epoch())
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    /// Host ports for a new component
    pub fn host(&self) -> SimHost {
        let owner = self.world.lock().issue_owner();
        SimHost::new(Arc::clone(&self.world), owner)
    }

    pub fn attach(&mut self, host: &SimHost, component: SimComponent) {
        self.components.insert(host.owner(), component);
    }

    pub fn now(&self) -> MonoTime {
        self.world.lock().elapsed()
    }

    /// Total wakes delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn advance(&mut self, by: Duration) -> Result<usize, SimError> {
        let target = self.now() + by;
        self.advance_to(target)
    }

    /// Deliver every wake due up to `target` in deadline order
    pub fn advance_to(&mut self, target: MonoTime) -> Result<usize, SimError> {
        let mut delivered = 0;
        let mut burst = (MonoTime::ZERO, 0usize);

        loop {
            let due = {
                let mut world = self.world.lock();
                match world.queue.next_deadline() {
                    Some(deadline) if deadline <= target => {
                        let at = world.delivery_time(deadline, target);
                        world.set_elapsed(at);
                        world.queue.pop_due(at)
                    }
                    _ => None,
                }
            };
            let Some(due) = due else { break };

            let now = self.now();
            if burst.0 == now {
                burst.1 += 1;
                if burst.1 > MAX_WAKES_PER_INSTANT {
                    return Err(SimError::WakeStorm { at: now, count: burst.1 });
                }
            } else {
                burst = (now, 1);
            }

            if let Some(component) = self.components.get(&due.owner) {
                component.lock().handle_wake(due.tag);
                delivered += 1;
            }
        }

        self.world.lock().set_elapsed(target);
        self.delivered += delivered as u64;
        Ok(delivered)
    }

    /// Fire a resume event at every subscriber
    pub fn resume(&mut self) -> usize {
        let targets = self.world.lock().queue.resume_targets();
        let mut delivered = 0;
        for (owner, tag) in targets {
            if let Some(component) = self.components.get(&owner) {
                component.lock().handle_wake(tag);
                delivered += 1;
            }
        }
        self.delivered += delivered as u64;
        delivered
    }

    /// Device asleep: no frames, no timers
    pub fn suspend(&mut self) {
        let mut world = self.world.lock();
        world.set_visible(false);
        world.set_timer_mode(TimerMode::Frozen);
    }

    /// Hidden tab: no frames, timers coarsened to `granularity`
    pub fn background(&mut self, granularity: Duration) {
        let mut world = self.world.lock();
        world.set_visible(false);
        world.set_timer_mode(TimerMode::Throttled(granularity));
    }

    /// Visible again: frames and timers restored, then a resume event
    pub fn wake(&mut self) -> usize {
        {
            let mut world = self.world.lock();
            world.set_visible(true);
            world.set_timer_mode(TimerMode::Normal);
        }
        self.resume()
    }
}

/// Scheduler wired to the simulated host and recording sinks
pub type SimScheduler = CountdownScheduler<SimHost, RecordingFastPath, RecordingObserver>;

/// A countdown scheduler running inside a [`SimHarness`]
pub struct CountdownRig {
    pub harness: SimHarness,
    pub scheduler: Arc<Mutex<SimScheduler>>,
    pub host: SimHost,
    pub fast: RecordingFastPath,
    pub states: RecordingObserver,
    pub calendar: PulseCalendar,
}

impl CountdownRig {
    pub fn new(world: SimWorld, config: SchedulerConfig) -> Self {
        let mut harness = SimHarness::new(world);
        let calendar = PulseCalendar::default();
        let host = harness.host();
        let fast = RecordingFastPath::new();
        let states = RecordingObserver::new(Arc::clone(harness.world()));

        let scheduler = match CountdownScheduler::with_config(
            host.clone(),
            fast.clone(),
            states.clone(),
            calendar,
            config,
        ) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "rejected scheduler config, using defaults");
                CountdownScheduler::new(host.clone(), fast.clone(), states.clone(), calendar)
            }
        };
        let scheduler = Arc::new(Mutex::new(scheduler));
        harness.attach(&host, scheduler.clone());

        CountdownRig {
            harness,
            scheduler,
            host,
            fast,
            states,
            calendar,
        }
    }

    pub fn start(&self) {
        self.scheduler.lock().start();
    }

    pub fn stop(&self) {
        self.scheduler.lock().stop();
    }

    pub fn advance(&mut self, by: Duration) -> Result<usize, SimError> {
        self.harness.advance(by)
    }

    /// Wall time the host clock currently shows
    pub fn host_wall(&self) -> WallTime {
        self.harness.world().lock().host_wall()
    }

    /// Remaining time computed directly from the host wall clock
    pub fn direct_remaining(&self) -> Duration {
        self.calendar.remaining_from(self.host_wall())
    }

    /// Remaining time from the last text written to the fast path
    pub fn displayed_remaining(&self) -> Option<Duration> {
        self.fast.last_text().as_deref().and_then(parse_remaining)
    }

    /// Distance between the scheduler's interpolated wall time and the host wall clock
    pub fn estimate_error(&self) -> Option<Duration> {
        let (mono, wall) = {
            let world = self.harness.world().lock();
            (world.host_mono(), world.host_wall())
        };
        let scheduler = self.scheduler.lock();
        let estimate = scheduler.snapshot()?.estimate_wall(mono).ok()?;
        Some(Duration::from_micros(estimate.micros_since(wall).unsigned_abs() as u64))
    }
}

/// Parse `"S.ffffff"` back into a duration
pub fn parse_remaining(text: &str) -> Option<Duration> {
    let (whole, frac) = text.split_once('.')?;
    if frac.len() != 6 {
        return None;
    }
    let secs: u64 = whole.parse().ok()?;
    let micros: u64 = frac.parse().ok()?;
    Some(Duration::from_secs(secs) + Duration::from_micros(micros))
}

/// Predefined scenarios
pub mod scenarios {
    use super::*;
    use crate::WallClockModel;
    use kairos_core::PulseConfig;

    /// Perfect clocks starting on the epoch
    pub fn steady() -> CountdownRig {
        CountdownRig::new(SimWorld::at_epoch(), SchedulerConfig::default())
    }

    /// Perfect clocks starting `offset` after the epoch
    pub fn starting_at(offset: Duration) -> CountdownRig {
        let world = SimWorld::new(PulseConfig::KKS.epoch() + offset, Duration::from_millis(16), 0);
        CountdownRig::new(world, SchedulerConfig::default())
    }

    /// Wall clock drifting by `ppm` against the monotonic clock
    pub fn drifting(ppm: f64) -> CountdownRig {
        let mut world = SimWorld::at_epoch();
        world.wall_model = WallClockModel::fast(ppm);
        CountdownRig::new(world, SchedulerConfig::default())
    }

    /// Timers delivered up to `jitter` late, seeded
    pub fn jittery(seed: u64, jitter: Duration) -> CountdownRig {
        let mut world = SimWorld::new(PulseConfig::KKS.epoch(), Duration::from_millis(16), seed);
        world.set_timer_jitter(jitter);
        CountdownRig::new(world, SchedulerConfig::default())
    }

    /// Battery-saving configuration on a 30 Hz surface
    pub fn low_power() -> CountdownRig {
        let world = SimWorld::new(PulseConfig::KKS.epoch(), Duration::from_millis(33), 0);
        CountdownRig::new(world, SchedulerConfig::low_power())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingPulses;
    use kairos_core::PulseConfig;
    use kairos_time::PulseWatcher;
    use proptest::prelude::*;

    const PULSE: Duration = Duration::from_millis(5236);
    const MS: Duration = Duration::from_millis(1);

    fn gap(a: Duration, b: Duration) -> Duration {
        if a > b {
            a - b
        } else {
            b - a
        }
    }

    #[test]
    fn test_exact_boundary() {
        let mut rig = scenarios::steady();
        rig.harness.suspend();
        rig.start();

        rig.harness.advance_to(MonoTime::from_millis(5236)).unwrap();
        rig.scheduler.lock().evaluate();

        assert_eq!(rig.calendar.pulse_index_at(rig.host_wall()), 1);
        assert_eq!(rig.states.wraps(), 1);
        assert_eq!(rig.fast.last_text().as_deref(), Some("5.236000"));
        assert_eq!(rig.fast.snapshot().last_progress(), Some(0.0));
        assert_eq!(rig.states.last().and_then(|s| s.remaining_secs), Some(5.236));
    }

    #[test]
    fn test_half_pulse() {
        let mut rig = scenarios::steady();
        rig.harness.suspend();
        rig.start();

        rig.harness.advance_to(MonoTime::from_millis(2618)).unwrap();
        rig.scheduler.lock().evaluate();

        let progress = rig.fast.snapshot().last_progress().unwrap();
        assert!((progress - 0.5).abs() < 1e-9);
        assert_eq!(rig.fast.last_text().as_deref(), Some("2.618000"));
        assert_eq!(rig.states.wraps(), 0);
    }

    #[test]
    fn test_skipped_boundaries_wrap_once() {
        let mut rig = scenarios::steady();
        rig.harness.suspend();
        rig.start();

        rig.harness.advance(PULSE * 15 / 2).unwrap();
        rig.harness.wake();

        assert_eq!(rig.states.wraps(), 1);
        let scheduler = rig.scheduler.lock();
        assert_eq!(scheduler.stats().boundaries_crossed, 7);
        assert_eq!(scheduler.next_boundary(), Some(PulseConfig::KKS.epoch() + PULSE * 8));
        drop(scheduler);

        rig.advance(Duration::from_secs(1)).unwrap();
        assert_eq!(rig.states.wraps(), 1);
    }

    #[test]
    fn test_steady_run() {
        let mut rig = scenarios::steady();
        rig.start();
        rig.advance(Duration::from_secs(30)).unwrap();

        // 30 s holds five boundaries
        assert_eq!(rig.states.wraps(), 5);
        let log = rig.states.snapshot();
        for (k, at) in log.wraps.iter().enumerate() {
            let boundary = MonoTime::from_micros(PULSE.as_micros() as u64 * (k as u64 + 1));
            let lag = at.elapsed_since(boundary).unwrap();
            assert!(lag <= 40 * MS, "wrap {} lagged {:?}", k, lag);
        }

        // remaining only increases at a wrap
        let mut wraps = log.wraps.iter().peekable();
        for pair in log.states.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let wrapped = wraps.next_if(|w| **w <= b.at).is_some();
            if !wrapped {
                assert!(b.state.remaining_secs <= a.state.remaining_secs);
            }
        }

        let fast = rig.fast.snapshot();
        assert!(fast.progress.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(fast.flashes, 5);
        assert!(!fast.flash_on);
    }

    #[test]
    fn test_idempotent_within_gap() {
        let mut rig = scenarios::steady();
        rig.harness.suspend();
        rig.start();
        rig.advance(100 * MS).unwrap();

        rig.scheduler.lock().evaluate();
        let writes = rig.fast.writes();
        let publishes = rig.states.publishes();

        rig.scheduler.lock().evaluate();
        rig.advance(3 * MS).unwrap();
        rig.scheduler.lock().evaluate();

        assert_eq!(rig.fast.writes(), writes);
        assert_eq!(rig.states.publishes(), publishes);
    }

    #[test]
    fn test_drift_is_bounded_by_resync() {
        for ppm in [500.0, -500.0] {
            let mut rig = scenarios::drifting(ppm);
            rig.start();

            for _ in 0..1200 {
                rig.advance(50 * MS).unwrap();
                let error = rig.estimate_error().unwrap();
                assert!(error <= MS, "ppm {} error {:?}", ppm, error);
            }

            let expected = rig.calendar.pulse_index_at(rig.host_wall()) as usize;
            assert_eq!(rig.states.wraps(), expected, "ppm {}", ppm);
        }
    }

    #[test]
    fn test_jittered_timers_never_double_wrap() {
        for seed in 0..4 {
            let mut rig = scenarios::jittery(seed, 8 * MS);
            rig.start();
            rig.advance(Duration::from_secs(30)).unwrap();

            let stats = rig.scheduler.lock().stats().clone();
            assert_eq!(rig.states.wraps(), 5, "seed {}", seed);
            assert_eq!(stats.boundaries_crossed, 5);
            assert!(rig.estimate_error().unwrap() <= MS);
        }
    }

    #[test]
    fn test_restart_leaks_nothing() {
        let mut rig = scenarios::steady();
        rig.start();

        for _ in 0..50 {
            rig.advance(100 * MS).unwrap();
            rig.scheduler.lock().restart();
            assert_eq!(rig.host.registrations(), 4);
        }

        rig.stop();
        assert_eq!(rig.host.registrations(), 0);
        assert!(rig.harness.world().lock().queue.is_empty());

        let evaluations = rig.scheduler.lock().stats().evaluations;
        rig.advance(Duration::from_secs(2)).unwrap();
        assert_eq!(rig.scheduler.lock().stats().evaluations, evaluations);
    }

    #[test]
    fn test_wall_clock_outage() {
        let mut rig = scenarios::steady();
        rig.start();
        rig.advance(Duration::from_secs(1)).unwrap();

        rig.harness.world().lock().set_wall_failing(true);
        let texts_before = rig.fast.snapshot().texts.len();
        rig.advance(Duration::from_secs(2)).unwrap();

        let stats = rig.scheduler.lock().stats().clone();
        assert!(stats.clock_failures >= 8);
        assert!(stats.recoveries_scheduled <= 3);
        assert!(rig.fast.snapshot().texts.len() > texts_before + 50);
        assert!(rig.estimate_error().unwrap() <= MS);

        rig.harness.world().lock().set_wall_failing(false);
        rig.advance(300 * MS).unwrap();
        assert!(rig.estimate_error().unwrap() <= MS);
        assert_eq!(rig.states.wraps(), 0);
    }

    #[test]
    fn test_monotonic_regression_recovers() {
        let mut rig = scenarios::steady();
        rig.start();
        rig.advance(Duration::from_secs(1)).unwrap();

        rig.harness.world().lock().regress_mono(200 * MS);
        rig.advance(500 * MS).unwrap();

        let stats = rig.scheduler.lock().stats().clone();
        assert!(stats.invalid_snapshots >= 1);
        assert!(stats.recoveries_scheduled >= 1);
        assert!(rig.estimate_error().unwrap() <= MS);
    }

    #[test]
    fn test_mono_failures_keep_last_good() {
        let mut rig = scenarios::steady();
        rig.start();
        rig.advance(Duration::from_secs(1)).unwrap();

        rig.harness.world().lock().fail_next_mono_reads(5);
        rig.advance(Duration::from_secs(1)).unwrap();

        assert!(rig.scheduler.lock().stats().clock_failures >= 5);
        assert!(rig.estimate_error().unwrap() <= MS);
        assert_eq!(rig.states.wraps(), 0);
    }

    #[test]
    fn test_wall_step_forward_wraps_once() {
        let mut rig = scenarios::steady();
        rig.start();
        rig.advance(Duration::from_secs(1)).unwrap();

        rig.harness.world().lock().step_wall(3_600_000_000);
        rig.advance(300 * MS).unwrap();

        assert_eq!(rig.states.wraps(), 1);
        let crossed = rig.scheduler.lock().stats().boundaries_crossed as i128;
        assert_eq!(crossed, rig.calendar.pulse_index_at(rig.host_wall()));
        assert!(rig.estimate_error().unwrap() <= MS);
    }

    #[test]
    fn test_wall_step_back_rebases() {
        let mut rig = scenarios::starting_at(PULSE * 10_000);
        rig.start();
        rig.advance(Duration::from_secs(1)).unwrap();

        rig.harness.world().lock().step_wall(-3_600_000_000);
        rig.advance(300 * MS).unwrap();
        assert_eq!(rig.states.wraps(), 0);

        let before = rig.calendar.pulse_index_at(rig.host_wall());
        rig.advance(Duration::from_secs(6)).unwrap();
        let after = rig.calendar.pulse_index_at(rig.host_wall());

        assert_eq!(rig.states.wraps() as i128, after - before);
        assert!(rig.estimate_error().unwrap() <= MS);
    }

    #[test]
    fn test_background_tab() {
        let mut rig = scenarios::steady();
        rig.start();
        rig.advance(200 * MS).unwrap();

        rig.harness.background(Duration::from_secs(1));
        rig.advance(Duration::from_secs(20)).unwrap();

        assert_eq!(rig.states.wraps(), 3);
        assert!(rig.estimate_error().unwrap() <= MS);

        rig.harness.wake();
        let displayed = rig.displayed_remaining().unwrap();
        let direct = rig.direct_remaining();
        assert!(gap(displayed, direct) <= MS);
    }

    #[test]
    fn test_low_power_preset() {
        let mut rig = scenarios::low_power();
        rig.start();
        rig.advance(Duration::from_secs(11)).unwrap();

        assert_eq!(rig.states.wraps(), 2);
        let stats = rig.scheduler.lock().stats().clone();
        assert!(stats.resyncs >= 20);
    }

    #[test]
    fn test_pulse_watcher_alongside_scheduler() {
        let mut rig = scenarios::steady();
        let pulses = RecordingPulses::new();
        let host = rig.harness.host();
        let watcher = Arc::new(Mutex::new(PulseWatcher::new(host.clone(), pulses.clone(), rig.calendar)));
        rig.harness.attach(&host, watcher.clone());

        rig.start();
        watcher.lock().start();
        rig.advance(Duration::from_secs(30)).unwrap();

        assert_eq!(pulses.indices(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(rig.states.wraps(), 5);

        watcher.lock().stop();
        assert_eq!(host.registrations(), 0);
    }

    #[test]
    fn test_parse_remaining() {
        assert_eq!(parse_remaining("5.236000"), Some(PULSE));
        assert_eq!(parse_remaining("0.000001"), Some(Duration::from_micros(1)));
        assert_eq!(parse_remaining("5.23"), None);
        assert_eq!(parse_remaining("x.000000"), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_resume_matches_direct_computation(
            start_ms in 0u64..5236,
            asleep_ms in 0u64..600_000,
        ) {
            let mut rig = scenarios::starting_at(Duration::from_millis(start_ms));
            rig.start();
            rig.advance(300 * MS).unwrap();

            rig.harness.suspend();
            rig.advance(Duration::from_millis(asleep_ms)).unwrap();
            rig.harness.wake();

            let displayed = rig.displayed_remaining().unwrap();
            let direct = rig.direct_remaining();
            prop_assert!(gap(displayed, direct) <= MS, "displayed {:?} direct {:?}", displayed, direct);
            prop_assert!(rig.states.wraps() <= 2);
        }

        #[test]
        fn prop_outputs_stay_in_bounds(start_us in 0u64..5_236_000, run_ms in 100u64..3000) {
            let mut rig = scenarios::starting_at(Duration::from_micros(start_us));
            rig.start();
            rig.advance(Duration::from_millis(run_ms)).unwrap();

            let fast = rig.fast.snapshot();
            prop_assert!(fast.progress.iter().all(|p| (0.0..=1.0).contains(p)));
            for text in &fast.texts {
                let remaining = parse_remaining(text).unwrap();
                prop_assert!(remaining <= PULSE && remaining > Duration::ZERO);
            }
        }
    }
}
