//! Runtime errors

use kairos_core::KairosError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{0}")]
    Kairos(#[from] KairosError),

    #[error("invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("tracing subscriber already installed: {0}")]
    Telemetry(String),

    #[error("status encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Collapse into the core taxonomy; environment problems are configuration errors
    pub fn into_kairos(self) -> KairosError {
        match self {
            RuntimeError::Kairos(e) => e,
            RuntimeError::Env { var, reason } => KairosError::InvalidConfig(format!("{}: {}", var, reason)),
            RuntimeError::Telemetry(msg) => KairosError::InvalidConfig(msg),
            RuntimeError::Encode(e) => KairosError::InvalidConfig(e.to_string()),
        }
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
