// SPDX-License-Identifier: MIT

//! Logging setup: a rolling file appender under the home directory plus an
//! env filter, returning the `WorkerGuard` the caller must keep alive for
//! the process lifetime.

use clamban_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    let log_dir = config.home_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "clamband.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}
