//! Tokio host - scheduler ports over real clocks and a shared wake queue

use std::sync::Arc;
use std::time::Duration;

use kairos_core::{KairosResult, MonoTime, WallTime};
use kairos_time::{
    DriverTag, FrameScheduler, HostHandle, MonotonicClock, OwnerId, ResumeSource, SystemClock,
    TimerMode, TimerScheduler, WakeQueue, WallClock,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

/// State shared between the driver and every host handle
#[derive(Clone, Debug)]
pub(crate) struct Shared {
    pub(crate) clock: SystemClock,
    pub(crate) queue: Arc<Mutex<WakeQueue>>,
    /// Signalled whenever a registration changes the next deadline
    pub(crate) changed: Arc<Notify>,
}

impl Shared {
    pub(crate) fn new(frame_period: Duration) -> Self {
        Shared {
            clock: SystemClock::new(),
            queue: Arc::new(Mutex::new(WakeQueue::new(frame_period))),
            changed: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn mono(&self) -> MonoTime {
        self.clock.mono_at(std::time::Instant::now())
    }

    fn register<F>(&self, f: F) -> HostHandle
    where
        F: FnOnce(&mut WakeQueue, MonoTime) -> HostHandle,
    {
        let now = self.mono();
        let handle = f(&mut self.queue.lock(), now);
        self.changed.notify_one();
        handle
    }

    fn cancel(&self, handle: HostHandle) {
        self.queue.lock().cancel(handle);
    }
}

/// Host ports for one component attached to a [`HostDriver`](crate::HostDriver)
///
/// Every registration is filed under the component's owner id so the
/// driver can route the wake back to it.
#[derive(Clone, Debug)]
pub struct TokioHost {
    shared: Shared,
    owner: OwnerId,
}

impl TokioHost {
    pub(crate) fn new(shared: Shared, owner: OwnerId) -> Self {
        TokioHost { shared, owner }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Live registrations held by this component
    pub fn registrations(&self) -> usize {
        self.shared.queue.lock().registrations_for(self.owner)
    }
}

impl MonotonicClock for TokioHost {
    fn monotonic_now(&self) -> KairosResult<MonoTime> {
        self.shared.clock.monotonic_now()
    }
}

impl WallClock for TokioHost {
    fn wall_now(&self) -> KairosResult<WallTime> {
        self.shared.clock.wall_now()
    }
}

impl FrameScheduler for TokioHost {
    fn request_frame(&mut self, tag: DriverTag) -> HostHandle {
        let owner = self.owner;
        self.shared.register(|q, now| q.add_frame(owner, tag, now))
    }

    fn cancel_frame(&mut self, handle: HostHandle) {
        self.shared.cancel(handle);
    }
}

impl TimerScheduler for TokioHost {
    fn set_interval(&mut self, period: Duration, tag: DriverTag) -> HostHandle {
        let owner = self.owner;
        self.shared.register(|q, now| q.add_interval(owner, tag, now, period))
    }

    fn set_timeout(&mut self, delay: Duration, tag: DriverTag) -> HostHandle {
        let owner = self.owner;
        self.shared.register(|q, now| q.add_timeout(owner, tag, now, delay))
    }

    fn clear_timer(&mut self, handle: HostHandle) {
        self.shared.cancel(handle);
    }
}

impl ResumeSource for TokioHost {
    fn subscribe_resume(&mut self, tag: DriverTag) -> HostHandle {
        let owner = self.owner;
        self.shared.register(|q, _| q.add_resume(owner, tag))
    }

    fn unsubscribe_resume(&mut self, handle: HostHandle) {
        self.shared.cancel(handle);
    }
}

/// Surface controls for the headless host: visibility and resume events
#[derive(Clone, Debug)]
pub struct HostControl {
    shared: Shared,
    resume_tx: mpsc::UnboundedSender<()>,
}

impl HostControl {
    pub(crate) fn new(shared: Shared, resume_tx: mpsc::UnboundedSender<()>) -> Self {
        HostControl { shared, resume_tx }
    }

    /// Deliver a resume event to every subscriber; false once the driver is gone
    pub fn resume(&self) -> bool {
        self.resume_tx.send(()).is_ok()
    }

    /// Hide or show the surface; frames only fire while shown
    pub fn set_visible(&self, visible: bool) {
        let now = self.shared.mono();
        self.shared.queue.lock().set_frames_enabled(visible, now);
        self.shared.changed.notify_one();
    }

    pub fn set_timer_mode(&self, mode: TimerMode) {
        self.shared.queue.lock().set_timer_mode(mode);
        self.shared.changed.notify_one();
    }

    pub fn now(&self) -> MonoTime {
        self.shared.mono()
    }
}
