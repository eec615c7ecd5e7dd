//! Error types for Kairos pulse time

use thiserror::Error;

/// Core Kairos errors
///
/// None of these is fatal: the scheduler recovers from each locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KairosError {
    #[error("Clock read failed: {0}")]
    ClockReadFailure(String),

    #[error("Integer magnitude {value} exceeds exact range, clamped to {clamped}")]
    ArithmeticOverflowGuard { value: i128, clamped: i64 },

    #[error("Invalid truth snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl KairosError {
    /// Errors that should trigger an immediate forced resync
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            KairosError::ClockReadFailure(_) | KairosError::InvalidSnapshot(_)
        )
    }
}

/// Result type for Kairos operations
pub type KairosResult<T> = Result<T, KairosError>;
