//! Channel-backed sinks and the JSON status line

use kairos_core::{month_name, narrow_saturating, Ark, Chakra, Weekday};
use kairos_time::{CountdownState, PulseObserver, PulseReading, StateObserver};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::RuntimeResult;

/// Observer-path event forwarded to async consumers
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CountdownEvent {
    State(CountdownState),
    Wrap,
}

/// [`StateObserver`] that forwards into an unbounded channel
///
/// Sends after the receiver is dropped are discarded.
#[derive(Clone, Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<CountdownEvent>,
}

impl ChannelObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CountdownEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelObserver { tx }, rx)
    }
}

impl StateObserver for ChannelObserver {
    fn on_state(&mut self, state: CountdownState) {
        let _ = self.tx.send(CountdownEvent::State(state));
    }

    fn on_wrap(&mut self) {
        let _ = self.tx.send(CountdownEvent::Wrap);
    }
}

/// [`PulseObserver`] that forwards readings into an unbounded channel
#[derive(Clone, Debug)]
pub struct ChannelPulseObserver {
    tx: mpsc::UnboundedSender<PulseReading>,
}

impl ChannelPulseObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PulseReading>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelPulseObserver { tx }, rx)
    }
}

impl PulseObserver for ChannelPulseObserver {
    fn on_pulse(&mut self, reading: &PulseReading) {
        let _ = self.tx.send(*reading);
    }
}

/// One line of machine-readable status
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusLine {
    pub pulse: i64,
    /// `beat:step`
    pub beat_step: String,
    pub weekday: String,
    pub ark: String,
    pub day_of_month: u8,
    pub month: String,
    pub year: i64,
    pub chakra: String,
    pub remaining_secs: Option<f64>,
    pub progress: f64,
}

impl StatusLine {
    pub fn new(reading: &PulseReading, state: CountdownState) -> Self {
        let pos = reading.position;
        StatusLine {
            pulse: narrow_saturating(reading.pulse_index),
            beat_step: pos.beat_step_label(),
            weekday: Weekday::from_index(pos.weekday as i64).name().to_string(),
            ark: Ark::from_beat(pos.beat as i64).name().to_string(),
            day_of_month: pos.day_of_month,
            month: month_name(pos.month as i64).to_string(),
            year: pos.year,
            chakra: Chakra::from_day_of_month(pos.day_of_month as i64).label().to_string(),
            remaining_secs: state.remaining_secs,
            progress: state.progress,
        }
    }

    pub fn to_json(&self) -> RuntimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_core::{PulseCalendar, PulseConfig};

    #[test]
    fn test_status_line_at_epoch() {
        let cal = PulseCalendar::default();
        let reading = PulseReading::from_wall(&cal, PulseConfig::KKS.epoch());
        let state = CountdownState {
            remaining_secs: Some(5.236),
            progress: 0.0,
        };

        let line = StatusLine::new(&reading, state);
        assert_eq!(line.pulse, 0);
        assert_eq!(line.beat_step, "0:00");
        assert_eq!(line.weekday, "Solhara");
        assert_eq!(line.ark, "Ignite");
        assert_eq!(line.month, "Aethon");
        assert_eq!(line.chakra, "Root");

        let json = line.to_json().unwrap();
        let back: StatusLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, line);
    }

    #[tokio::test]
    async fn test_channel_observer_forwards() {
        let (mut observer, mut rx) = ChannelObserver::channel();
        observer.on_state(CountdownState::STOPPED);
        observer.on_wrap();

        assert_eq!(rx.recv().await, Some(CountdownEvent::State(CountdownState::STOPPED)));
        assert_eq!(rx.recv().await, Some(CountdownEvent::Wrap));

        drop(rx);
        observer.on_wrap();
    }
}
