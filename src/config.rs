use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cli::{Cli, LogLevel};
use crate::error::ConfigError;
use crate::mirror::IgnoreFilter;
use crate::mirror::root::resolve_absolute;

/// Name of the optional configuration file looked up in the source root.
pub const CONFIG_FILE: &str = "dirmirror.toml";

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_OUTPUT: &str = "logs";

/// Configuration loaded from `dirmirror.toml` at the source root.
///
/// The file sits beside the watched subdirectories, so it is never mirrored.
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct MirrorConfig {
    /// Regex for paths that should never be mirrored.
    pub ignore_pattern: Option<String>,
    pub log_level: Option<LogLevel>,
    pub log_output: Option<PathBuf>,
}

impl MirrorConfig {
    /// Load configuration from `dirmirror.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("warning: failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!("warning: failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}

/// Validated settings for a mirroring run. CLI flags win over the config file.
#[derive(Debug)]
pub struct Settings {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub ignore: IgnoreFilter,
    pub log_level: LogLevel,
    pub log_output: PathBuf,
    pub json: bool,
}

impl Settings {
    /// Merge CLI flags over `dirmirror.toml` and validate the result.
    ///
    /// Creates the destination root when it does not exist yet. Nothing else
    /// is touched on disk.
    pub fn resolve(cli: Cli) -> Result<Self, ConfigError> {
        if !cli.source.is_dir() {
            return Err(ConfigError::SourceNotDirectory(absolute_for_display(
                &cli.source,
            )));
        }
        let source = canonical(&cli.source)?;
        let file = MirrorConfig::load(&source);

        if cli.destination.exists() && !cli.destination.is_dir() {
            return Err(ConfigError::DestinationNotDirectory(absolute_for_display(
                &cli.destination,
            )));
        }
        let destination = resolve_absolute(&cli.destination).map_err(|source| ConfigError::Io {
            path: cli.destination.clone(),
            source,
        })?;
        if destination.starts_with(&source) || source.starts_with(&destination) {
            return Err(ConfigError::Overlap {
                source_root: source,
                dest_root: destination,
            });
        }

        let log_output = cli
            .log_output
            .or(file.log_output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_OUTPUT));
        if log_output.exists() && !log_output.is_dir() {
            return Err(ConfigError::LogOutputNotDirectory(absolute_for_display(
                &log_output,
            )));
        }

        let pattern = cli.ignore_pattern.or(file.ignore_pattern);
        let ignore = IgnoreFilter::new(pattern.as_deref())?;

        std::fs::create_dir_all(&destination).map_err(|source| ConfigError::Io {
            path: destination.clone(),
            source,
        })?;
        let destination = canonical(&destination)?;

        Ok(Self {
            source,
            destination,
            ignore,
            log_level: cli.log_level.or(file.log_level).unwrap_or_default(),
            log_output,
            json: cli.json,
        })
    }
}

fn canonical(path: &Path) -> Result<PathBuf, ConfigError> {
    std::fs::canonicalize(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn absolute_for_display(path: &Path) -> PathBuf {
    resolve_absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
