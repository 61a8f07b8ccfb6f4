use std::fmt;
use std::io;
use std::path::PathBuf;

/// Invalid startup configuration. Fatal: reported before any watcher starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Argument source resolves to {0}, which is not a directory.")]
    SourceNotDirectory(PathBuf),

    #[error("Argument destination resolves to {0}, which is not a directory.")]
    DestinationNotDirectory(PathBuf),

    #[error("Argument log_output resolves to {0}, which is not a directory.")]
    LogOutputNotDirectory(PathBuf),

    #[error("source {source_root} and destination {dest_root} must not contain one another")]
    Overlap {
        source_root: PathBuf,
        dest_root: PathBuf,
    },

    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to resolve {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The filesystem operation a [`MirrorError::Io`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    Copy,
    Remove,
    CreateDir,
    Prune,
}

impl fmt::Display for MirrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Copy => "copy",
            Self::Remove => "remove",
            Self::CreateDir => "create directory",
            Self::Prune => "prune",
        };
        f.write_str(name)
    }
}

/// A failure while mirroring a single change event.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The path mapper was handed a path outside the watch root. This is a
    /// programming error in the event source, never a runtime race.
    #[error("{path} is not under watch root {root}")]
    OutsideWatchRoot { path: PathBuf, root: PathBuf },

    /// The source of a copy disappeared between notification and action.
    #[error("source {0} vanished before it could be copied")]
    SourceVanished(PathBuf),

    #[error("failed to {action} {path}: {source}")]
    Io {
        action: MirrorAction,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MirrorError {
    pub fn io(action: MirrorAction, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// True for benign races with concurrent third-party filesystem activity.
    pub fn is_transient_race(&self) -> bool {
        matches!(self, Self::SourceVanished(_))
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
