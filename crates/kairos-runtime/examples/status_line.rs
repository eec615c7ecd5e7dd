//! Live countdown in the terminal
//!
//! Prints the remaining time on one line at frame rate and a JSON status
//! line on every pulse. Configure with `KAIROS_*` variables and `RUST_LOG`.
//!
//! ```text
//! cargo run -p kairos-runtime --example status_line
//! KAIROS_LOG_FORMAT=json KAIROS_DETAIL_VIEW=1 cargo run -p kairos-runtime --example status_line
//! ```

use std::io::Write;
use std::sync::Arc;

use kairos_core::PulseCalendar;
use kairos_runtime::{
    init_tracing, ChannelObserver, ChannelPulseObserver, CountdownEvent, HostDriver, RuntimeConfig,
    RuntimeResult, StatusLine,
};
use kairos_time::{CountdownScheduler, CountdownState, FastPath, PulseWatcher};
use parking_lot::Mutex;

/// Writes the countdown straight to the terminal
struct TerminalLine {
    flash: bool,
}

impl FastPath for TerminalLine {
    fn set_progress(&mut self, _progress: f64) {}

    fn set_remaining_text(&mut self, text: &str) {
        let marker = if self.flash { '*' } else { ' ' };
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{} {}s ", marker, text);
        let _ = out.flush();
    }

    fn set_flash(&mut self, on: bool) {
        self.flash = on;
    }
}

#[tokio::main]
async fn main() -> RuntimeResult<()> {
    let config = RuntimeConfig::from_env()?;
    init_tracing(config.log_format)?;

    let calendar = PulseCalendar::default();
    let mut driver = HostDriver::from_config(&config);

    let (observer, mut states) = ChannelObserver::channel();
    let host = driver.host();
    let scheduler = CountdownScheduler::with_config(
        host.clone(),
        TerminalLine { flash: false },
        observer,
        calendar,
        config.scheduler_config(),
    )?;
    let scheduler = Arc::new(Mutex::new(scheduler));
    driver.attach(&host, scheduler.clone());

    let (pulse_observer, mut pulses) = ChannelPulseObserver::channel();
    let watch_host = driver.host();
    let watcher = Arc::new(Mutex::new(PulseWatcher::new(watch_host.clone(), pulse_observer, calendar)));
    driver.attach(&watch_host, watcher.clone());

    {
        let mut s = scheduler.lock();
        s.set_detail_view(config.detail_view);
        s.start();
    }
    watcher.lock().start();

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let driver_task = tokio::spawn(driver.run(shutdown));

    let mut latest = CountdownState::STOPPED;
    loop {
        tokio::select! {
            event = states.recv() => match event {
                Some(CountdownEvent::State(state)) => latest = state,
                Some(CountdownEvent::Wrap) => tracing::debug!("pulse boundary"),
                None => break,
            },
            reading = pulses.recv() => match reading {
                Some(reading) => println!("\n{}", StatusLine::new(&reading, latest).to_json()?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    scheduler.lock().stop();
    watcher.lock().stop();
    if let Ok(stats) = driver_task.await {
        tracing::info!(wakes = stats.wakes, resumes = stats.resumes, "driver finished");
    }
    Ok(())
}
