//! Runtime configuration read from the environment
//!
//! Durations use humantime syntax (`16ms`, `1s 500ms`). Unset variables keep
//! their defaults; a set but unparseable variable is an error.

use std::time::Duration;

use kairos_time::SchedulerConfig;
use serde::{Deserialize, Serialize};

use crate::{RuntimeError, RuntimeResult};

pub const ENV_FRAME_PERIOD: &str = "KAIROS_FRAME_PERIOD";
pub const ENV_FALLBACK_PERIOD: &str = "KAIROS_FALLBACK_PERIOD";
pub const ENV_RESYNC_PERIOD: &str = "KAIROS_RESYNC_PERIOD";
pub const ENV_DETAIL_VIEW: &str = "KAIROS_DETAIL_VIEW";
pub const ENV_LOG_FORMAT: &str = "KAIROS_LOG_FORMAT";

/// Log output style
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Host runtime configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Period of the headless frame tick
    pub frame_period: Duration,
    pub fallback_period: Duration,
    pub resync_period: Duration,
    /// Start with the detail-view publish rate
    pub detail_view: bool,
    pub log_format: LogFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        RuntimeConfig {
            frame_period: Duration::from_millis(16),
            fallback_period: scheduler.fallback_period,
            resync_period: scheduler.resync_period,
            detail_view: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl RuntimeConfig {
    /// Read the process environment
    pub fn from_env() -> RuntimeResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> RuntimeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RuntimeConfig::default();

        if let Some(v) = lookup(ENV_FRAME_PERIOD) {
            config.frame_period = parse_period(ENV_FRAME_PERIOD, &v)?;
        }
        if let Some(v) = lookup(ENV_FALLBACK_PERIOD) {
            config.fallback_period = parse_period(ENV_FALLBACK_PERIOD, &v)?;
        }
        if let Some(v) = lookup(ENV_RESYNC_PERIOD) {
            config.resync_period = parse_period(ENV_RESYNC_PERIOD, &v)?;
        }
        if let Some(v) = lookup(ENV_DETAIL_VIEW) {
            config.detail_view = parse_flag(ENV_DETAIL_VIEW, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG_FORMAT) {
            config.log_format = match v.trim().to_ascii_lowercase().as_str() {
                "pretty" | "text" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                other => {
                    return Err(RuntimeError::Env {
                        var: ENV_LOG_FORMAT,
                        reason: format!("unknown log format {:?}", other),
                    })
                }
            };
        }

        config.scheduler_config().validate()?;
        Ok(config)
    }

    /// Scheduler configuration with this runtime's periods applied
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            fallback_period: self.fallback_period,
            resync_period: self.resync_period,
            ..SchedulerConfig::default()
        }
    }
}

fn parse_period(var: &'static str, value: &str) -> RuntimeResult<Duration> {
    let period = humantime::parse_duration(value.trim()).map_err(|e| RuntimeError::Env {
        var,
        reason: e.to_string(),
    })?;
    if period.is_zero() {
        return Err(RuntimeError::Env {
            var,
            reason: "period must be non-zero".into(),
        });
    }
    Ok(period)
}

fn parse_flag(var: &'static str, value: &str) -> RuntimeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(RuntimeError::Env {
            var,
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}
