//! Host ports - everything the scheduler needs from its environment
//!
//! The host owns the real timers. Components register with a `DriverTag`
//! and the host hands that tag back through [`Wakeable::handle_wake`] when
//! the timer, frame or resume event fires. The `run` generation in the tag
//! lets a component drop wakes that belong to a run it already cancelled.

use std::time::Duration;

use kairos_core::{KairosResult, MonoTime, WallTime};

/// Opaque registration handle issued by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostHandle(pub u64);

/// Which driver a wake belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// Frame-synchronized evaluation
    Frame,
    /// Fixed-period fallback evaluation
    Fallback,
    /// Periodic truth resync
    Resync,
    /// Host surface became visible / focused again
    Resume,
    /// One-shot resync after a clock or snapshot failure
    Recovery,
    /// One-shot end of the boundary flash
    FlashEnd,
    /// Pulse watcher sampling tick
    Sample,
    /// Breath loop one-shot
    Breath,
}

/// Tag a component attaches to every registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DriverTag {
    /// Run generation of the registering component
    pub run: u64,
    pub kind: DriverKind,
}

impl DriverTag {
    pub fn new(run: u64, kind: DriverKind) -> Self {
        DriverTag { run, kind }
    }
}

/// High-resolution monotonic clock
pub trait MonotonicClock {
    fn monotonic_now(&self) -> KairosResult<MonoTime>;
}

/// Absolute wall clock
pub trait WallClock {
    fn wall_now(&self) -> KairosResult<WallTime>;
}

/// Frame-synchronized callback request/cancel pair
///
/// A request fires at most once; the component re-requests to keep a loop.
pub trait FrameScheduler {
    fn request_frame(&mut self, tag: DriverTag) -> HostHandle;
    fn cancel_frame(&mut self, handle: HostHandle);
}

/// Fixed-period and one-shot timers
pub trait TimerScheduler {
    fn set_interval(&mut self, period: Duration, tag: DriverTag) -> HostHandle;
    fn set_timeout(&mut self, delay: Duration, tag: DriverTag) -> HostHandle;
    fn clear_timer(&mut self, handle: HostHandle);
}

/// Visibility / focus / page-show event source
pub trait ResumeSource {
    fn subscribe_resume(&mut self, tag: DriverTag) -> HostHandle;
    fn unsubscribe_resume(&mut self, handle: HostHandle);
}

/// Everything a scheduler instance needs from its host
pub trait HostPorts: MonotonicClock + WallClock + FrameScheduler + TimerScheduler + ResumeSource {}

impl<T> HostPorts for T where T: MonotonicClock + WallClock + FrameScheduler + TimerScheduler + ResumeSource {}

/// Component that accepts wakes from its host
pub trait Wakeable {
    fn handle_wake(&mut self, tag: DriverTag);
}

/// Low-level presentation writes, bypassing any reactive update cycle
pub trait FastPath {
    fn set_progress(&mut self, progress: f64);
    fn set_remaining_text(&mut self, text: &str);
    /// Boundary flash on/off
    fn set_flash(&mut self, _on: bool) {}
}

/// Low-rate state observer
pub trait StateObserver {
    fn on_state(&mut self, state: CountdownState);
    /// One coalesced notification per detected set of crossed boundaries
    fn on_wrap(&mut self) {}
}

/// Value published on the observer path
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct CountdownState {
    /// Seconds until the next boundary; `None` while stopped
    pub remaining_secs: Option<f64>,
    /// Progress through the current pulse, 0..=1
    pub progress: f64,
}

impl CountdownState {
    pub const STOPPED: CountdownState = CountdownState {
        remaining_secs: None,
        progress: 0.0,
    };
}

/// Fast path that discards every write
#[derive(Clone, Copy, Debug, Default)]
pub struct NullFastPath;

impl FastPath for NullFastPath {
    fn set_progress(&mut self, _progress: f64) {}
    fn set_remaining_text(&mut self, _text: &str) {}
}

impl<F: FastPath + ?Sized> FastPath for Box<F> {
    fn set_progress(&mut self, progress: f64) {
        (**self).set_progress(progress)
    }

    fn set_remaining_text(&mut self, text: &str) {
        (**self).set_remaining_text(text)
    }

    fn set_flash(&mut self, on: bool) {
        (**self).set_flash(on)
    }
}

impl<O: StateObserver + ?Sized> StateObserver for Box<O> {
    fn on_state(&mut self, state: CountdownState) {
        (**self).on_state(state)
    }

    fn on_wrap(&mut self) {
        (**self).on_wrap()
    }
}
