//! Kairos Time - live countdown to the next pulse boundary
//!
//! This crate implements the scheduling half of Kairos pulse time:
//! - Host ports (clocks, frame callbacks, timers, resume events)
//! - Truth snapshots re-derived from the pulse calendar
//! - The drift-resistant countdown scheduler
//! - A low-rate pulse watcher and phase-locked breath loop
//! - A deterministic wake queue hosts can build on

pub mod ports;
pub mod snapshot;
pub mod queue;
pub mod clock;
pub mod scheduler;
pub mod watch;
pub mod cadence;

pub use ports::*;
pub use snapshot::*;
pub use queue::*;
pub use clock::*;
pub use scheduler::*;
pub use watch::*;
pub use cadence::*;
