//! Pulse watcher - low-rate notification when the pulse index changes
//!
//! Samples the wall clock on a coarse interval and on every host resume,
//! and notifies its observer only when a new pulse has started. Consumers
//! that render per-pulse content (labels, calendar position) use this
//! instead of the countdown scheduler's smooth outputs.

use std::time::Duration;

use kairos_core::{CalendarPosition, KairosResult, MicroPulses, PulseCalendar, WallTime};

use crate::{DriverKind, DriverTag, HostHandle, ResumeSource, TimerScheduler, WallClock, Wakeable};

/// Default sampling period
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(125);

/// A sample taken when the pulse index changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseReading {
    pub at: WallTime,
    pub micro_pulses: MicroPulses,
    pub pulse_index: i128,
    pub position: CalendarPosition,
}

impl PulseReading {
    pub fn from_wall(calendar: &PulseCalendar, at: WallTime) -> Self {
        let micro_pulses = calendar.micro_pulses_since_epoch(at);
        PulseReading {
            at,
            micro_pulses,
            pulse_index: micro_pulses.pulse_index(),
            position: micro_pulses.calendar_position(),
        }
    }
}

/// Receives a reading each time a new pulse begins
pub trait PulseObserver {
    fn on_pulse(&mut self, reading: &PulseReading);
}

impl<O: PulseObserver + ?Sized> PulseObserver for Box<O> {
    fn on_pulse(&mut self, reading: &PulseReading) {
        (**self).on_pulse(reading)
    }
}

/// Samples the pulse index and reports changes
pub struct PulseWatcher<H, O> {
    host: H,
    observer: O,
    calendar: PulseCalendar,
    sample_period: Duration,
    run: u64,
    running: bool,
    sample_timer: Option<HostHandle>,
    resume: Option<HostHandle>,
    last: Option<PulseReading>,
    samples: u64,
    changes: u64,
}

impl<H, O> PulseWatcher<H, O>
where
    H: WallClock + TimerScheduler + ResumeSource,
    O: PulseObserver,
{
    pub fn new(host: H, observer: O, calendar: PulseCalendar) -> Self {
        Self::with_period(host, observer, calendar, DEFAULT_SAMPLE_PERIOD)
    }

    pub fn with_period(host: H, observer: O, calendar: PulseCalendar, sample_period: Duration) -> Self {
        PulseWatcher {
            host,
            observer,
            calendar,
            sample_period: sample_period.max(Duration::from_millis(1)),
            run: 0,
            running: false,
            sample_timer: None,
            resume: None,
            last: None,
            samples: 0,
            changes: 0,
        }
    }

    /// Sample once, then register the interval and resume subscription
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.run += 1;
        self.running = true;

        if let Err(e) = self.sample() {
            tracing::warn!(error = %e, "initial pulse sample failed");
        }

        let sample_tag = DriverTag::new(self.run, DriverKind::Sample);
        let resume_tag = DriverTag::new(self.run, DriverKind::Resume);
        self.sample_timer = Some(self.host.set_interval(self.sample_period, sample_tag));
        self.resume = Some(self.host.subscribe_resume(resume_tag));
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        if let Some(h) = self.sample_timer.take() {
            self.host.clear_timer(h);
        }
        if let Some(h) = self.resume.take() {
            self.host.unsubscribe_resume(h);
        }
        self.run += 1;
        self.running = false;
    }

    /// Read the wall clock; notify the observer if the pulse index moved
    ///
    /// Returns the new reading when a notification was sent.
    pub fn sample(&mut self) -> KairosResult<Option<PulseReading>> {
        let now = self.host.wall_now()?;
        self.samples += 1;

        let reading = PulseReading::from_wall(&self.calendar, now);
        if self.last.map(|r| r.pulse_index) == Some(reading.pulse_index) {
            return Ok(None);
        }

        tracing::trace!(pulse = %reading.pulse_index, "pulse changed");
        self.last = Some(reading);
        self.changes += 1;
        self.observer.on_pulse(&reading);
        Ok(Some(reading))
    }

    /// Most recent reading delivered to the observer
    pub fn last(&self) -> Option<&PulseReading> {
        self.last.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn changes(&self) -> u64 {
        self.changes
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

impl<H, O> Wakeable for PulseWatcher<H, O>
where
    H: WallClock + TimerScheduler + ResumeSource,
    O: PulseObserver,
{
    fn handle_wake(&mut self, tag: DriverTag) {
        if !self.running || tag.run != self.run {
            return;
        }
        match tag.kind {
            DriverKind::Sample | DriverKind::Resume => {
                if let Err(e) = self.sample() {
                    tracing::warn!(error = %e, "pulse sample failed, keeping last reading");
                }
            }
            _ => {}
        }
    }
}
