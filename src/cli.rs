use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// Continuously mirror every subdirectory of a source tree into a destination tree.
///
/// dirmirror watches each immediate subdirectory of the source for file
/// creations, modifications, moves, and deletions, and replays them under the
/// destination so that it keeps the same relative layout.
#[derive(Parser, Debug)]
#[command(name = "dirmirror", version, about, long_about = None)]
pub struct Cli {
    /// The directory to watch for changes. Changes will be watched in all subdirectories.
    #[arg(short, long)]
    pub source: PathBuf,

    /// The directory to which changed files are mirrored.
    #[arg(short, long)]
    pub destination: PathBuf,

    /// A regex matched anywhere in a path; matching paths are never mirrored.
    #[arg(short, long)]
    pub ignore_pattern: Option<String>,

    /// Log verbosity. `RUST_LOG` takes precedence when set.
    #[arg(short, long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Directory where log files are written (defaults to ./logs).
    #[arg(short = 'o', long)]
    pub log_output: Option<PathBuf>,

    /// Print the shutdown summary as JSON instead of human-readable text.
    #[arg(long)]
    pub json: bool,
}

/// Log verbosity levels accepted on the command line and in `dirmirror.toml`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Critical,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}
