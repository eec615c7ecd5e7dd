//! Wake queue - deterministic registry of host timers
//!
//! Hosts (the tokio runtime, the simulated host in tests) keep their
//! registrations here and ask it which wake is due next. Frame requests
//! fire on the next frame tick; intervals re-arm after each fire; one-shots
//! are removed. Frames can be suspended and timers throttled or frozen to
//! model a backgrounded surface.

use std::collections::BTreeMap;
use std::time::Duration;

use kairos_core::MonoTime;

use crate::{DriverTag, HostHandle};

/// Which component a registration belongs to
pub type OwnerId = u32;

/// How the host is currently running timers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimerMode {
    /// Timers fire on time
    #[default]
    Normal,
    /// Timers fire no more often than the given granularity (background tab)
    Throttled(Duration),
    /// No timer fires at all (device sleep)
    Frozen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Registration {
    owner: OwnerId,
    tag: DriverTag,
}

#[derive(Clone, Copy, Debug)]
enum Repeat {
    Once,
    Every(Duration),
}

#[derive(Clone, Copy, Debug)]
struct TimerEntry {
    reg: Registration,
    due: MonoTime,
    repeat: Repeat,
}

#[derive(Clone, Copy, Debug)]
struct FrameEntry {
    reg: Registration,
    requested_at: MonoTime,
}

/// A wake that is due for dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueWake {
    /// When the wake was due
    pub at: MonoTime,
    pub owner: OwnerId,
    pub tag: DriverTag,
    pub handle: HostHandle,
}

/// Registry of frame requests, timers and resume subscriptions
#[derive(Debug)]
pub struct WakeQueue {
    next_handle: u64,
    timers: BTreeMap<HostHandle, TimerEntry>,
    frames: BTreeMap<HostHandle, FrameEntry>,
    resume: BTreeMap<HostHandle, Registration>,
    frame_period: Duration,
    frames_enabled: bool,
    frames_enabled_at: MonoTime,
    timer_mode: TimerMode,
}

impl WakeQueue {
    /// Create a queue delivering frames every `frame_period`
    pub fn new(frame_period: Duration) -> Self {
        WakeQueue {
            next_handle: 1,
            timers: BTreeMap::new(),
            frames: BTreeMap::new(),
            resume: BTreeMap::new(),
            frame_period: frame_period.max(Duration::from_micros(1)),
            frames_enabled: true,
            frames_enabled_at: MonoTime::ZERO,
            timer_mode: TimerMode::Normal,
        }
    }

    fn issue(&mut self) -> HostHandle {
        let handle = HostHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    pub fn add_frame(&mut self, owner: OwnerId, tag: DriverTag, now: MonoTime) -> HostHandle {
        let handle = self.issue();
        self.frames.insert(
            handle,
            FrameEntry {
                reg: Registration { owner, tag },
                requested_at: now,
            },
        );
        handle
    }

    pub fn add_interval(
        &mut self,
        owner: OwnerId,
        tag: DriverTag,
        now: MonoTime,
        period: Duration,
    ) -> HostHandle {
        let period = period.max(Duration::from_micros(1));
        let handle = self.issue();
        self.timers.insert(
            handle,
            TimerEntry {
                reg: Registration { owner, tag },
                due: now + period,
                repeat: Repeat::Every(period),
            },
        );
        handle
    }

    pub fn add_timeout(
        &mut self,
        owner: OwnerId,
        tag: DriverTag,
        now: MonoTime,
        delay: Duration,
    ) -> HostHandle {
        let handle = self.issue();
        self.timers.insert(
            handle,
            TimerEntry {
                reg: Registration { owner, tag },
                due: now + delay,
                repeat: Repeat::Once,
            },
        );
        handle
    }

    pub fn add_resume(&mut self, owner: OwnerId, tag: DriverTag) -> HostHandle {
        let handle = self.issue();
        self.resume.insert(handle, Registration { owner, tag });
        handle
    }

    /// Remove a registration of any kind; returns whether it existed
    pub fn cancel(&mut self, handle: HostHandle) -> bool {
        self.timers.remove(&handle).is_some()
            || self.frames.remove(&handle).is_some()
            || self.resume.remove(&handle).is_some()
    }

    /// Remove every registration held by `owner`; returns how many there were
    pub fn cancel_owner(&mut self, owner: OwnerId) -> usize {
        let before = self.len();
        self.timers.retain(|_, e| e.reg.owner != owner);
        self.frames.retain(|_, e| e.reg.owner != owner);
        self.resume.retain(|_, r| r.owner != owner);
        before - self.len()
    }

    pub fn set_frames_enabled(&mut self, enabled: bool, now: MonoTime) {
        if enabled && !self.frames_enabled {
            self.frames_enabled_at = now;
        }
        self.frames_enabled = enabled;
    }

    pub fn frames_enabled(&self) -> bool {
        self.frames_enabled
    }

    pub fn set_timer_mode(&mut self, mode: TimerMode) {
        self.timer_mode = mode;
    }

    pub fn timer_mode(&self) -> TimerMode {
        self.timer_mode
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// First frame tick strictly after `after`
    fn next_frame_tick(&self, after: MonoTime) -> MonoTime {
        let period = self.frame_period.as_micros() as u64;
        let ticks = after.as_micros() / period + 1;
        MonoTime::from_micros(ticks.saturating_mul(period))
    }

    fn frame_due(&self, entry: &FrameEntry) -> Option<MonoTime> {
        if !self.frames_enabled {
            return None;
        }
        Some(self.next_frame_tick(entry.requested_at.max(self.frames_enabled_at)))
    }

    fn timer_due(&self, entry: &TimerEntry) -> Option<MonoTime> {
        match self.timer_mode {
            TimerMode::Normal => Some(entry.due),
            TimerMode::Frozen => None,
            TimerMode::Throttled(granularity) => {
                let g = granularity.as_micros().max(1) as u64;
                let due = entry.due.as_micros();
                Some(MonoTime::from_micros(due.div_ceil(g).saturating_mul(g)))
            }
        }
    }

    /// Earliest deadline of any pending registration
    pub fn next_deadline(&self) -> Option<MonoTime> {
        let timers = self.timers.values().filter_map(|e| self.timer_due(e));
        let frames = self.frames.values().filter_map(|e| self.frame_due(e));
        timers.chain(frames).min()
    }

    /// Pop the earliest wake due at or before `now`
    ///
    /// Intervals re-arm one period after the time they fired; a timer that
    /// fell behind fires once rather than replaying every missed period.
    pub fn pop_due(&mut self, now: MonoTime) -> Option<DueWake> {
        let timer = self
            .timers
            .iter()
            .filter_map(|(h, e)| self.timer_due(e).map(|due| (due, *h)))
            .filter(|(due, _)| *due <= now)
            .min();
        let frame = self
            .frames
            .iter()
            .filter_map(|(h, e)| self.frame_due(e).map(|due| (due, *h)))
            .filter(|(due, _)| *due <= now)
            .min();

        let pick_timer = match (timer, frame) {
            (Some(t), Some(f)) => t <= f,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if pick_timer {
            let (at, handle) = timer?;
            let entry = self.timers.get(&handle).copied()?;
            match entry.repeat {
                Repeat::Once => {
                    self.timers.remove(&handle);
                }
                Repeat::Every(period) => {
                    if let Some(e) = self.timers.get_mut(&handle) {
                        e.due = at.max(now) + period;
                    }
                }
            }
            Some(DueWake {
                at,
                owner: entry.reg.owner,
                tag: entry.reg.tag,
                handle,
            })
        } else {
            let (at, handle) = frame?;
            let entry = self.frames.remove(&handle)?;
            Some(DueWake {
                at,
                owner: entry.reg.owner,
                tag: entry.reg.tag,
                handle,
            })
        }
    }

    /// Resume subscriptions, in registration order
    pub fn resume_targets(&self) -> Vec<(OwnerId, DriverTag)> {
        self.resume.values().map(|r| (r.owner, r.tag)).collect()
    }

    /// Number of live registrations held for `owner`
    pub fn registrations_for(&self, owner: OwnerId) -> usize {
        self.timers.values().filter(|e| e.reg.owner == owner).count()
            + self.frames.values().filter(|e| e.reg.owner == owner).count()
            + self.resume.values().filter(|r| r.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.timers.len() + self.frames.len() + self.resume.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
