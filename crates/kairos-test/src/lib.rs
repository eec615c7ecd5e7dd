//! Kairos Test Harness - deterministic simulation of the countdown runtime
//!
//! This crate provides:
//! - A simulated host with controllable clocks and timers
//! - Recording fast-path and observer sinks
//! - A deterministic event loop and canned scenarios
//! - Drift, suspension and clock-failure testing

pub mod countdown_sim;
pub mod recording;
pub mod sim_host;

pub use countdown_sim::*;
pub use recording::*;
pub use sim_host::*;
