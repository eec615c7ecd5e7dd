//! Recording sinks - capture everything a component writes
//!
//! Each sink is a cheap clone around shared state, so a test keeps one
//! handle while the component owns the other.

use std::sync::Arc;

use kairos_core::MonoTime;
use kairos_time::{CountdownState, FastPath, PulseObserver, PulseReading, StateObserver};
use parking_lot::Mutex;

use crate::SharedWorld;

/// Everything written to the fast path
#[derive(Clone, Debug, Default)]
pub struct FastPathLog {
    pub progress: Vec<f64>,
    pub texts: Vec<String>,
    pub flash_on: bool,
    pub flashes: u64,
}

impl FastPathLog {
    pub fn last_text(&self) -> Option<&str> {
        self.texts.last().map(String::as_str)
    }

    pub fn last_progress(&self) -> Option<f64> {
        self.progress.last().copied()
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordingFastPath {
    log: Arc<Mutex<FastPathLog>>,
}

impl RecordingFastPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FastPathLog {
        self.log.lock().clone()
    }

    pub fn last_text(&self) -> Option<String> {
        self.log.lock().last_text().map(str::to_string)
    }

    pub fn writes(&self) -> usize {
        let log = self.log.lock();
        log.progress.len() + log.texts.len()
    }
}

impl FastPath for RecordingFastPath {
    fn set_progress(&mut self, progress: f64) {
        self.log.lock().progress.push(progress);
    }

    fn set_remaining_text(&mut self, text: &str) {
        self.log.lock().texts.push(text.to_string());
    }

    fn set_flash(&mut self, on: bool) {
        let mut log = self.log.lock();
        if on {
            log.flashes += 1;
        }
        log.flash_on = on;
    }
}

/// A published state with the simulated time it arrived
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedState {
    pub at: MonoTime,
    pub state: CountdownState,
}

#[derive(Clone, Debug, Default)]
pub struct StateLog {
    pub states: Vec<TimedState>,
    /// Simulated times of each wrap notification
    pub wraps: Vec<MonoTime>,
}

/// Observer that timestamps against the simulated world
#[derive(Clone, Debug)]
pub struct RecordingObserver {
    world: SharedWorld,
    log: Arc<Mutex<StateLog>>,
}

impl RecordingObserver {
    pub fn new(world: SharedWorld) -> Self {
        RecordingObserver {
            world,
            log: Arc::new(Mutex::new(StateLog::default())),
        }
    }

    pub fn snapshot(&self) -> StateLog {
        self.log.lock().clone()
    }

    pub fn wraps(&self) -> usize {
        self.log.lock().wraps.len()
    }

    pub fn publishes(&self) -> usize {
        self.log.lock().states.len()
    }

    pub fn last(&self) -> Option<CountdownState> {
        self.log.lock().states.last().map(|s| s.state)
    }

    fn now(&self) -> MonoTime {
        self.world.lock().elapsed()
    }
}

impl StateObserver for RecordingObserver {
    fn on_state(&mut self, state: CountdownState) {
        let at = self.now();
        self.log.lock().states.push(TimedState { at, state });
    }

    fn on_wrap(&mut self) {
        let at = self.now();
        self.log.lock().wraps.push(at);
    }
}

/// Pulse observer that keeps every reading
#[derive(Clone, Debug, Default)]
pub struct RecordingPulses {
    readings: Arc<Mutex<Vec<PulseReading>>>,
}

impl RecordingPulses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> Vec<PulseReading> {
        self.readings.lock().clone()
    }

    pub fn indices(&self) -> Vec<i128> {
        self.readings.lock().iter().map(|r| r.pulse_index).collect()
    }
}

impl PulseObserver for RecordingPulses {
    fn on_pulse(&mut self, reading: &PulseReading) {
        self.readings.lock().push(*reading);
    }
}
