//! Tracing subscriber setup for binaries and demos

use tracing_subscriber::EnvFilter;

use crate::{LogFormat, RuntimeError, RuntimeResult};

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`)
pub fn init_tracing(format: LogFormat) -> RuntimeResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| RuntimeError::Telemetry(e.to_string()))
}
