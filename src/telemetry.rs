//! Logging setup.
//!
//! `RUST_LOG` always wins; otherwise `vdash=info`, or `vdash=debug` with
//! `--verbose`. The dashboard logs to a file because it owns the terminal.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::AppError;

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "vdash=debug,warn" } else { "vdash=info,warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Compact logs on stderr, for the one-shot commands.
pub fn init_stderr_logger(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

/// Append logs to `path`, for the interactive dashboard.
pub fn init_file_logger(path: &Path, verbose: bool) -> Result<(), AppError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open log file {}: {e}", path.display())))?;

    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_thread_ids(true),
        )
        .try_init();
    Ok(())
}
