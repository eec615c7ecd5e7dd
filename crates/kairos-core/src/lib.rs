//! Kairos Core - Pulse calendar primitives
//!
//! This crate defines the deterministic half of Kairos pulse time:
//! - Time primitives (WallTime, MonoTime)
//! - Pulse configuration and calendar unit constants
//! - Exact micro-pulse calendar arithmetic
//! - Label tables and display formatting
//!
//! Nothing here reads a clock or schedules work.

pub mod time;
pub mod config;
pub mod calendar;
pub mod normalize;
pub mod labels;
pub mod format;
pub mod error;

pub use time::*;
pub use config::*;
pub use calendar::*;
pub use normalize::*;
pub use labels::*;
pub use format::*;
pub use error::*;
