//! Tracing setup for Slipstream
//!
//! Provides dual output: console logs at a user-controlled level and full
//! debug logs to disk, so complete diagnostic information survives a run
//! while the console stays readable.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Initialize tracing with dual output: console (user level) + file (full debug)
///
/// Writes complete debug logs to `logs/slipstream-last-run.log`, overwriting
/// the previous run.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If the logs directory cannot be created
///   or the log file cannot be opened for writing
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));

    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join("slipstream-last-run.log");
    let log_file = File::create(&log_file_path)?;

    // Console layer - respects user's chosen log level
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    // File layer - always captures everything at TRACE level
    let file_filter = EnvFilter::new("trace");

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        "Tracing initialized: console={}, debug_file={}",
        console_level,
        log_file_path.display()
    );

    Ok(())
}
