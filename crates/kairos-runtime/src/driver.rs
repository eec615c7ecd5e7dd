//! Host driver - the event loop that turns queue deadlines into wakes
//!
//! Components are shared as `Arc<Mutex<_>>` so callers keep a typed handle
//! (to start, stop or reconfigure them) while the driver dispatches wakes.
//! The queue lock is always released before a component is locked.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kairos_time::{OwnerId, Wakeable};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::host::Shared;
use crate::{HostControl, RuntimeConfig, TokioHost};

/// A component the driver can wake
pub type SharedComponent = Arc<Mutex<dyn Wakeable + Send>>;

/// Upper bound on wakes dispatched before yielding back to the loop
const MAX_DISPATCH_BATCH: usize = 1024;

/// Longest the loop sleeps with nothing registered
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub loops: u64,
    pub wakes: u64,
    pub resumes: u64,
    /// Wakes whose owner was already detached
    pub orphaned: u64,
}

/// Event loop for [`TokioHost`] components
pub struct HostDriver {
    shared: Shared,
    components: BTreeMap<OwnerId, SharedComponent>,
    next_owner: OwnerId,
    resume_tx: mpsc::UnboundedSender<()>,
    resume_rx: mpsc::UnboundedReceiver<()>,
    stats: DriverStats,
}

impl HostDriver {
    pub fn new(frame_period: Duration) -> Self {
        let (resume_tx, resume_rx) = mpsc::unbounded_channel();
        HostDriver {
            shared: Shared::new(frame_period),
            components: BTreeMap::new(),
            next_owner: 1,
            resume_tx,
            resume_rx,
            stats: DriverStats::default(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.frame_period)
    }

    /// Host ports for a new component; pass the result to the component's constructor
    pub fn host(&mut self) -> TokioHost {
        let owner = self.next_owner;
        self.next_owner += 1;
        TokioHost::new(self.shared.clone(), owner)
    }

    /// Route wakes for `host`'s owner id to `component`
    pub fn attach(&mut self, host: &TokioHost, component: SharedComponent) {
        self.components.insert(host.owner(), component);
    }

    /// Stop routing wakes to `owner` and drop its registrations
    pub fn detach(&mut self, owner: OwnerId) -> Option<SharedComponent> {
        let dropped = self.shared.queue.lock().cancel_owner(owner);
        tracing::debug!(owner, dropped, "component detached");
        self.components.remove(&owner)
    }

    pub fn control(&self) -> HostControl {
        HostControl::new(self.shared.clone(), self.resume_tx.clone())
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Dispatch every wake that is due now; returns how many were delivered
    pub fn dispatch_due(&mut self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_DISPATCH_BATCH {
            let now = self.shared.mono();
            let due = self.shared.queue.lock().pop_due(now);
            let Some(due) = due else { break };

            match self.components.get(&due.owner) {
                Some(component) => {
                    component.lock().handle_wake(due.tag);
                    self.stats.wakes += 1;
                    delivered += 1;
                }
                None => {
                    self.stats.orphaned += 1;
                    tracing::trace!(owner = due.owner, tag = ?due.tag, "wake for detached owner");
                }
            }
        }
        delivered
    }

    /// Hand a resume event to every subscriber
    pub fn dispatch_resume(&mut self) {
        self.stats.resumes += 1;
        let targets = self.shared.queue.lock().resume_targets();
        for (owner, tag) in targets {
            if let Some(component) = self.components.get(&owner) {
                component.lock().handle_wake(tag);
            }
        }
    }

    fn next_sleep(&self) -> Instant {
        let deadline = self.shared.queue.lock().next_deadline();
        match deadline {
            Some(at) => Instant::from_std(self.shared.clock.instant_at(at)),
            None => Instant::now() + IDLE_SLEEP,
        }
    }

    /// Run until `shutdown` completes
    pub async fn run<S>(mut self, shutdown: S) -> DriverStats
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::debug!(components = self.components.len(), "host driver running");

        loop {
            self.stats.loops += 1;
            self.dispatch_due();
            let wake_at = self.next_sleep();

            tokio::select! {
                _ = &mut shutdown => break,
                Some(()) = self.resume_rx.recv() => self.dispatch_resume(),
                _ = self.shared.changed.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }

        tracing::debug!(wakes = self.stats.wakes, resumes = self.stats.resumes, "host driver stopped");
        self.stats
    }
}
