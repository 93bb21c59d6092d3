//! Tracing subscriber setup for the `codelens` binary.
//!
//! Library code logs through `tracing` macros only; the binary installs a
//! formatting subscriber once at startup. The filter comes from `RUST_LOG`
//! and falls back to the level passed on the command line.
//!
//! Logs always go to stderr. With a log directory, they are also written
//! without ANSI colors to `codelens.log`, rotated daily.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Base name of the rotating log file inside the log directory.
pub const LOG_FILE_PREFIX: &str = "codelens.log";

/// Install the global subscriber. Repeated calls are ignored.
///
/// Keep the returned guard alive until exit; dropping it flushes the file
/// writer.
pub fn init(default_level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .try_init();

    Ok(guard)
}

/// Filter directive for our crates at `level`, keeping HTTP and SQL
/// internals at `warn`.
fn default_filter(level: &str) -> String {
    let level = match level.to_lowercase().as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => level.to_lowercase(),
        _ => "info".to_string(),
    };
    format!("warn,codelens={level},codelens_core={level}")
}
