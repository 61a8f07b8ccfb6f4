use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Install the global tracing subscriber, writing to a fresh log file in `log_dir`.
///
/// `RUST_LOG` overrides `level` when set. Returns the path of the log file.
pub fn init(level: LogLevel, log_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let path = next_log_file(log_dir, Local::now().date_naive())?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_directive())),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(path)
}

/// The next log file for `date`: `<date>-<n>.log`, where `n` is one more than
/// the number of files in `log_dir` already named for that date.
pub fn next_log_file(log_dir: &Path, date: NaiveDate) -> anyhow::Result<PathBuf> {
    let prefix = date.format("%Y-%m-%d").to_string();
    let existing = fs::read_dir(log_dir)
        .with_context(|| format!("failed to list {}", log_dir.display()))?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .count();
    Ok(log_dir.join(format!("{prefix}-{}.log", existing + 1)))
}
