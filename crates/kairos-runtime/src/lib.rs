//! Kairos Runtime - tokio host for the countdown scheduler
//!
//! Provides:
//! - `TokioHost`: scheduler ports over the system clocks
//! - `HostDriver`: the event loop dispatching timer, frame and resume wakes
//! - `RuntimeConfig`: environment configuration with humantime durations
//! - `init_tracing`: tracing-subscriber setup for binaries

pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod sinks;
pub mod telemetry;

pub use config::*;
pub use driver::*;
pub use error::*;
pub use host::{HostControl, TokioHost};
pub use sinks::*;
pub use telemetry::*;
