//! Countdown scheduler - smooth, self-healing countdown to the next pulse boundary
//!
//! Three drivers feed one evaluation step:
//! - a frame-synchronized driver for smoothness while the host paints
//! - a fixed-period fallback that keeps running when frames are paused
//! - a periodic resync that discards interpolation and re-derives truth
//!
//! Interpolation uses the monotonic clock between truth snapshots. Resync
//! always wins over interpolation, so the displayed value can never drift
//! from the calendar by more than one resync period.

use std::time::Duration;

use kairos_core::{
    clamp01, format_remaining_micros, KairosError, KairosResult, MonoTime, PulseCalendar, WallTime,
};

use crate::{
    CountdownState, DriverKind, DriverTag, FastPath, HostHandle, HostPorts, StateObserver,
    TruthSnapshot, Wakeable,
};

/// Countdown scheduler configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period of the fallback evaluation driver
    pub fallback_period: Duration,
    /// Period of the unconditional truth resync
    pub resync_period: Duration,
    /// Unforced evaluations closer together than this are suppressed
    pub min_eval_gap: Duration,
    /// Observer publish interval while a detail view is open
    pub publish_interval_detail: Duration,
    /// Observer publish interval otherwise
    pub publish_interval_idle: Duration,
    /// How long the boundary flash stays on
    pub flash_duration: Duration,
    /// Delay of the one-shot resync scheduled after a failure
    pub recovery_delay: Duration,
    /// Consecutive one-shot recoveries before waiting for the periodic resync
    pub max_recovery_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            fallback_period: Duration::from_millis(33),
            resync_period: Duration::from_millis(250),
            min_eval_gap: Duration::from_millis(8),
            publish_interval_detail: Duration::from_millis(100),
            publish_interval_idle: Duration::from_millis(250),
            flash_duration: Duration::from_millis(180),
            recovery_delay: Duration::ZERO,
            max_recovery_attempts: 3,
        }
    }
}

impl SchedulerConfig {
    /// Configuration for battery-constrained hosts
    pub fn low_power() -> Self {
        SchedulerConfig {
            fallback_period: Duration::from_millis(66),
            resync_period: Duration::from_millis(500),
            min_eval_gap: Duration::from_millis(16),
            publish_interval_detail: Duration::from_millis(200),
            publish_interval_idle: Duration::from_millis(500),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> KairosResult<()> {
        let periods = [
            ("fallback_period", self.fallback_period),
            ("resync_period", self.resync_period),
            ("publish_interval_detail", self.publish_interval_detail),
            ("publish_interval_idle", self.publish_interval_idle),
        ];
        for (name, period) in periods {
            if period.is_zero() {
                return Err(KairosError::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }
        if self.min_eval_gap >= self.fallback_period {
            return Err(KairosError::InvalidConfig(format!(
                "min_eval_gap {:?} would suppress every fallback tick ({:?})",
                self.min_eval_gap, self.fallback_period
            )));
        }
        Ok(())
    }
}

/// Scheduler lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No drivers registered; published state is `{None, 0}`
    Stopped,
    /// First snapshot and publish in progress
    Starting,
    /// Drivers registered and evaluating
    Running,
    /// Taking a fresh truth snapshot
    Resynchronizing,
    /// Handling a detected boundary crossing
    BoundaryCrossed,
}

/// Scheduler counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub evaluations: u64,
    /// Unforced evaluations dropped by the minimum gap
    pub suppressed: u64,
    pub resyncs: u64,
    /// Coalesced wrap notifications
    pub wraps: u64,
    /// Individual boundaries crossed, including skipped ones
    pub boundaries_crossed: u64,
    pub clock_failures: u64,
    pub invalid_snapshots: u64,
    pub recoveries_scheduled: u64,
    pub publishes: u64,
    pub fast_writes: u64,
}

#[derive(Debug, Default)]
struct Drivers {
    frame: Option<HostHandle>,
    fallback: Option<HostHandle>,
    resync: Option<HostHandle>,
    resume: Option<HostHandle>,
    recovery: Option<HostHandle>,
    flash: Option<HostHandle>,
}

/// Drift-resistant countdown scheduler
///
/// Owns its truth snapshot exclusively; one instance per visible widget.
pub struct CountdownScheduler<H, F, O> {
    host: H,
    fast: F,
    observer: O,
    calendar: PulseCalendar,
    config: SchedulerConfig,
    phase: SchedulerPhase,
    /// Run generation; wakes tagged with an older run are dropped
    run: u64,
    drivers: Drivers,
    snapshot: Option<TruthSnapshot>,
    /// Most recent boundary a wrap was announced for
    announced_through: Option<WallTime>,
    last_eval: Option<MonoTime>,
    last_publish: Option<MonoTime>,
    last_text: Option<String>,
    last_progress: Option<f64>,
    published: CountdownState,
    detail_view: bool,
    recovery_attempts: u32,
    stats: SchedulerStats,
}

impl<H, F, O> CountdownScheduler<H, F, O>
where
    H: HostPorts,
    F: FastPath,
    O: StateObserver,
{
    /// Create a stopped scheduler with default configuration
    pub fn new(host: H, fast: F, observer: O, calendar: PulseCalendar) -> Self {
        CountdownScheduler {
            host,
            fast,
            observer,
            calendar,
            config: SchedulerConfig::default(),
            phase: SchedulerPhase::Stopped,
            run: 0,
            drivers: Drivers::default(),
            snapshot: None,
            announced_through: None,
            last_eval: None,
            last_publish: None,
            last_text: None,
            last_progress: None,
            published: CountdownState::STOPPED,
            detail_view: false,
            recovery_attempts: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Create a stopped scheduler with custom configuration
    pub fn with_config(
        host: H,
        fast: F,
        observer: O,
        calendar: PulseCalendar,
        config: SchedulerConfig,
    ) -> KairosResult<Self> {
        config.validate()?;
        let mut scheduler = Self::new(host, fast, observer, calendar);
        scheduler.config = config;
        Ok(scheduler)
    }

    fn tag(&self, kind: DriverKind) -> DriverTag {
        DriverTag::new(self.run, kind)
    }

    /// Start the drivers
    ///
    /// Takes a truth snapshot and publishes once before any driver can
    /// fire. If no snapshot can be taken yet, that first publish is
    /// [`CountdownState::STOPPED`] and a recovery resync is scheduled.
    /// Calling `start` on a running scheduler does nothing.
    pub fn start(&mut self) {
        if self.phase != SchedulerPhase::Stopped {
            tracing::trace!(run = self.run, "start ignored, already running");
            return;
        }

        self.run += 1;
        self.phase = SchedulerPhase::Starting;
        self.snapshot = None;
        self.announced_through = None;
        self.last_eval = None;
        self.last_publish = None;
        self.last_text = None;
        self.last_progress = None;
        self.recovery_attempts = 0;

        self.resync();
        self.evaluate_inner(true);
        if self.snapshot.is_none() {
            self.published = CountdownState::STOPPED;
            self.stats.publishes += 1;
            self.observer.on_state(CountdownState::STOPPED);
        }

        let (fallback_period, resync_period) = (self.config.fallback_period, self.config.resync_period);
        let frame = self.host.request_frame(self.tag(DriverKind::Frame));
        let fallback = self.host.set_interval(fallback_period, self.tag(DriverKind::Fallback));
        let resync = self.host.set_interval(resync_period, self.tag(DriverKind::Resync));
        let resume = self.host.subscribe_resume(self.tag(DriverKind::Resume));

        self.drivers.frame = Some(frame);
        self.drivers.fallback = Some(fallback);
        self.drivers.resync = Some(resync);
        self.drivers.resume = Some(resume);
        self.phase = SchedulerPhase::Running;

        tracing::debug!(run = self.run, next_boundary = ?self.next_boundary(), "countdown started");
    }

    /// Cancel every driver and pending one-shot
    ///
    /// After this returns no evaluation runs until the next `start`.
    pub fn stop(&mut self) {
        if self.phase == SchedulerPhase::Stopped {
            return;
        }

        if let Some(h) = self.drivers.frame.take() {
            self.host.cancel_frame(h);
        }
        for h in [
            self.drivers.fallback.take(),
            self.drivers.resync.take(),
            self.drivers.recovery.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.host.clear_timer(h);
        }
        if let Some(h) = self.drivers.flash.take() {
            self.host.clear_timer(h);
            self.fast.set_flash(false);
        }
        if let Some(h) = self.drivers.resume.take() {
            self.host.unsubscribe_resume(h);
        }

        // orphan anything the host already queued for this run
        self.run += 1;
        self.phase = SchedulerPhase::Stopped;
        self.snapshot = None;
        self.published = CountdownState::STOPPED;
        self.observer.on_state(CountdownState::STOPPED);

        tracing::debug!(run = self.run, "countdown stopped");
    }

    /// Stop, then start from a fresh snapshot
    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    /// Switch between the detail-view and idle publish rates
    pub fn set_detail_view(&mut self, open: bool) {
        if self.detail_view == open {
            return;
        }
        self.detail_view = open;
        if self.is_running() {
            self.evaluate_inner(true);
        }
    }

    /// Unforced evaluation, as run by the frame and fallback drivers
    pub fn evaluate(&mut self) {
        self.evaluate_inner(false);
    }

    /// Forced resync followed by a forced publish
    pub fn resync_now(&mut self) {
        if self.phase == SchedulerPhase::Stopped {
            return;
        }
        self.resync();
        self.evaluate_inner(true);
    }

    /// Take a fresh truth snapshot; keeps the last-known-good one on failure
    fn resync(&mut self) -> bool {
        let resumed_phase = self.phase;
        if resumed_phase == SchedulerPhase::Running {
            self.phase = SchedulerPhase::Resynchronizing;
        }
        let ok = self.take_snapshot();
        if resumed_phase == SchedulerPhase::Running {
            self.phase = SchedulerPhase::Running;
        }
        ok
    }

    fn take_snapshot(&mut self) -> bool {
        let mono = match self.host.monotonic_now() {
            Ok(mono) => mono,
            Err(e) => {
                self.note_failure(&e);
                return false;
            }
        };

        let (wall, wall_is_real) = match self.host.wall_now() {
            Ok(wall) => (wall, true),
            Err(e) => {
                self.note_failure(&e);
                let estimate = self.snapshot.and_then(|s| s.estimate_wall(mono).ok());
                match estimate {
                    Some(estimate) => (estimate, false),
                    None => return false,
                }
            }
        };

        match TruthSnapshot::take(&self.calendar, wall, mono) {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.stats.resyncs += 1;
                if wall_is_real {
                    self.recovery_attempts = 0;
                }
                tracing::trace!(
                    run = self.run,
                    anchor = ?snapshot.anchor_wall(),
                    next_boundary = ?snapshot.next_boundary(),
                    estimated = !wall_is_real,
                    "truth resynced"
                );
                true
            }
            Err(e) => {
                self.note_failure(&e);
                false
            }
        }
    }

    fn note_failure(&mut self, error: &KairosError) {
        match error {
            KairosError::ClockReadFailure(_) => self.stats.clock_failures += 1,
            KairosError::InvalidSnapshot(_) => self.stats.invalid_snapshots += 1,
            _ => {}
        }
        tracing::warn!(run = self.run, error = %error, "falling back to last-known-good snapshot");

        if error.needs_resync() {
            self.schedule_recovery();
        }
    }

    fn schedule_recovery(&mut self) {
        if self.phase == SchedulerPhase::Stopped || self.drivers.recovery.is_some() {
            return;
        }
        if self.recovery_attempts >= self.config.max_recovery_attempts {
            tracing::debug!(
                run = self.run,
                attempts = self.recovery_attempts,
                "recovery budget spent, waiting for periodic resync"
            );
            return;
        }

        self.recovery_attempts += 1;
        self.stats.recoveries_scheduled += 1;
        let tag = self.tag(DriverKind::Recovery);
        let handle = self.host.set_timeout(self.config.recovery_delay, tag);
        self.drivers.recovery = Some(handle);
    }

    /// The evaluation step shared by every driver
    fn evaluate_inner(&mut self, force: bool) {
        if self.phase == SchedulerPhase::Stopped {
            return;
        }

        let now = match self.host.monotonic_now() {
            Ok(now) => now,
            Err(e) => {
                self.note_failure(&e);
                match self.last_eval {
                    Some(last) => last,
                    None => return,
                }
            }
        };

        if !force {
            let too_soon = self
                .last_eval
                .and_then(|last| now.elapsed_since(last))
                .map_or(false, |gap| gap < self.config.min_eval_gap);
            if too_soon {
                self.stats.suppressed += 1;
                tracing::trace!(run = self.run, ?now, "evaluation suppressed");
                return;
            }
        }

        self.last_eval = Some(now);
        self.stats.evaluations += 1;

        let Some(mut snapshot) = self.snapshot else {
            self.schedule_recovery();
            return;
        };

        let estimate = match snapshot.estimate_wall(now) {
            Ok(estimate) => estimate,
            Err(e) => {
                self.note_failure(&e);
                snapshot.anchor_wall()
            }
        };

        let pulse = self.calendar.config().pulse();
        if snapshot.advance_boundary(estimate, pulse) > 0 {
            self.snapshot = Some(snapshot);
        }

        let missed = self.boundaries_passed(snapshot.next_boundary().saturating_sub(pulse));
        let crossed = missed > 0;
        if crossed {
            self.phase = SchedulerPhase::BoundaryCrossed;
            self.stats.wraps += 1;
            self.stats.boundaries_crossed += missed;
        }

        let remaining_us = snapshot.next_boundary().micros_since(estimate).max(0);
        let remaining = format_remaining_micros(remaining_us);
        let progress = clamp01(1.0 - remaining.secs / self.calendar.config().pulse_secs_f64());

        if self.last_progress != Some(progress) {
            self.last_progress = Some(progress);
            self.fast.set_progress(progress);
            self.stats.fast_writes += 1;
        }
        if self.last_text.as_deref() != Some(remaining.text.as_str()) {
            self.fast.set_remaining_text(&remaining.text);
            self.last_text = Some(remaining.text);
            self.stats.fast_writes += 1;
        }

        let interval = if self.detail_view {
            self.config.publish_interval_detail
        } else {
            self.config.publish_interval_idle
        };
        let publish_due = self
            .last_publish
            .map_or(true, |last| now.elapsed_since(last).map_or(true, |d| d >= interval));

        if force || crossed || publish_due {
            self.publish(
                CountdownState {
                    remaining_secs: Some(remaining.secs),
                    progress,
                },
                now,
            );
        }

        if crossed {
            tracing::debug!(run = self.run, missed, next_boundary = ?snapshot.next_boundary(), "pulse boundary crossed");
            self.resync();
            self.start_flash();
            self.phase = SchedulerPhase::Running;
            self.observer.on_wrap();
        }
    }

    /// Count boundaries between the last announced one and `passed`
    ///
    /// Crossings are measured against what was already announced rather than
    /// against the snapshot, so a resync that lands after a boundary cannot
    /// hide it and one that lands just before cannot repeat it.
    fn boundaries_passed(&mut self, passed: WallTime) -> u64 {
        let pulse_us = self.calendar.config().pulse_micros();
        let Some(announced) = self.announced_through else {
            self.announced_through = Some(passed);
            return 0;
        };

        let delta = passed.micros_since(announced);
        if delta > 0 {
            self.announced_through = Some(passed);
            (delta / pulse_us).clamp(1, u64::MAX as i128) as u64
        } else {
            if -delta > pulse_us {
                tracing::debug!(run = self.run, ?passed, ?announced, "wall clock stepped back, rebasing");
                self.announced_through = Some(passed);
            }
            0
        }
    }

    fn publish(&mut self, state: CountdownState, now: MonoTime) {
        self.published = state;
        self.last_publish = Some(now);
        self.stats.publishes += 1;
        self.observer.on_state(state);
    }

    fn start_flash(&mut self) {
        if let Some(h) = self.drivers.flash.take() {
            self.host.clear_timer(h);
        }
        self.fast.set_flash(true);
        let tag = self.tag(DriverKind::FlashEnd);
        let handle = self.host.set_timeout(self.config.flash_duration, tag);
        self.drivers.flash = Some(handle);
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != SchedulerPhase::Stopped
    }

    pub fn run_generation(&self) -> u64 {
        self.run
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn calendar(&self) -> &PulseCalendar {
        &self.calendar
    }

    /// Last value delivered on the observer path
    pub fn published(&self) -> CountdownState {
        self.published
    }

    pub fn snapshot(&self) -> Option<&TruthSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn next_boundary(&self) -> Option<WallTime> {
        self.snapshot.map(|s| s.next_boundary())
    }

    /// Last remaining-time text written to the fast path
    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    pub fn detail_view(&self) -> bool {
        self.detail_view
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn fast_path(&self) -> &F {
        &self.fast
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

impl<H, F, O> Wakeable for CountdownScheduler<H, F, O>
where
    H: HostPorts,
    F: FastPath,
    O: StateObserver,
{
    fn handle_wake(&mut self, tag: DriverTag) {
        if tag.run != self.run || self.phase == SchedulerPhase::Stopped {
            tracing::trace!(?tag, run = self.run, "stale wake dropped");
            return;
        }

        match tag.kind {
            DriverKind::Frame => {
                self.drivers.frame = None;
                self.evaluate_inner(false);
                if self.is_running() && self.drivers.frame.is_none() {
                    self.drivers.frame = Some(self.host.request_frame(tag));
                }
            }
            DriverKind::Fallback => self.evaluate_inner(false),
            DriverKind::Resync => {
                self.resync();
                self.evaluate_inner(true);
            }
            DriverKind::Resume => {
                tracing::debug!(run = self.run, "host resumed, forcing resync");
                self.resync();
                self.evaluate_inner(true);
            }
            DriverKind::Recovery => {
                self.drivers.recovery = None;
                self.resync();
                self.evaluate_inner(true);
            }
            DriverKind::FlashEnd => {
                self.drivers.flash = None;
                self.fast.set_flash(false);
            }
            DriverKind::Sample | DriverKind::Breath => {
                tracing::trace!(?tag, "wake not handled by countdown scheduler");
            }
        }
    }
}
