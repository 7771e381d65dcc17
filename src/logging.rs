use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{Dispatch, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, FmtSubscriber, Layer};

/// Maps the `-v` count to a console level.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the process-wide console subscriber.
pub fn init_console(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// `<log_dir>/<stem>_<YYYY-MM-DD>.log` for one input file.
pub fn log_file_path(log_dir: &Path, input: &Path, date: chrono::NaiveDate) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    log_dir.join(format!("{}_{}.log", stem, date.format("%Y-%m-%d")))
}

/// Builds a dispatcher that writes to the console and appends to the per-file log.
///
/// Used with `tracing::dispatcher::with_default` around the processing of one file,
/// so every event for that file also lands in its own log.
pub fn file_dispatch(log_dir: &Path, input: &Path, console: Level) -> Result<(Dispatch, PathBuf)> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    let path = log_file_path(log_dir, input, chrono::Local::now().date_naive());
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_filter(LevelFilter::from_level(console)),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::DEBUG),
        );
    Ok((Dispatch::new(subscriber), path))
}
