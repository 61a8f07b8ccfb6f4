use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::mirror::WatchRoot;
use crate::mirror::copy::{copy_with_metadata, remove_file_if_exists};
use crate::mirror::prune::prune_upward;
use crate::output::MirrorStats;

use super::event::{ChangeEvent, ChangeKind};

/// What a single event did to the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event concerned a directory; directories are mirrored only as a
    /// byproduct of file copies.
    SkippedDirectory,
    /// A path matched the ignore pattern.
    Ignored,
    Copied,
    /// The source vanished before it could be copied.
    SourceVanished,
    Removed { pruned: usize },
    Moved {
        copied: bool,
        removed: bool,
        pruned: usize,
    },
}

/// Turns one [`ChangeEvent`] into the corresponding mirror action.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    root: Arc<WatchRoot>,
    stats: Arc<MirrorStats>,
}

impl EventTranslator {
    pub fn new(root: Arc<WatchRoot>, stats: Arc<MirrorStats>) -> Self {
        Self { root, stats }
    }

    pub fn root(&self) -> &WatchRoot {
        &self.root
    }

    /// Apply `event` to the destination tree.
    ///
    /// Never fails: an unexpected error abandons this event's action and is
    /// logged as a warning naming the event, so the watch loop keeps going.
    pub fn handle(&self, event: &ChangeEvent) -> Option<Outcome> {
        match self.apply(event) {
            Ok(outcome) => {
                self.record(outcome);
                Some(outcome)
            }
            Err(err) => {
                self.stats.record_failure();
                warn!(event = %event, error = %err, "failed to mirror event");
                None
            }
        }
    }

    /// Dispatch on the event kind. Errors are returned, not logged.
    pub fn apply(&self, event: &ChangeEvent) -> Result<Outcome> {
        if event.is_directory {
            debug!(event = %event, "skipping directory event");
            return Ok(Outcome::SkippedDirectory);
        }

        let ignore = self.root.ignore();
        let ignored = ignore.is_ignored(&event.source_path)
            || event.dest_path().is_some_and(|dest| ignore.is_ignored(dest));
        if ignored {
            debug!(event = %event, "ignoring event matching ignore pattern");
            return Ok(Outcome::Ignored);
        }

        debug!(event = %event, "mirroring");
        match &event.kind {
            ChangeKind::Created => self.on_created(&event.source_path),
            ChangeKind::Modified => self.on_modified(&event.source_path),
            ChangeKind::Moved { dest_path } => self.on_moved(&event.source_path, dest_path),
            ChangeKind::Deleted => self.on_deleted(&event.source_path),
        }
    }

    fn on_created(&self, src: &Path) -> Result<Outcome> {
        let dst = self.root.map(src)?;
        copy_tolerating_race(src, &dst)
    }

    fn on_modified(&self, src: &Path) -> Result<Outcome> {
        let dst = self.root.map(src)?;
        remove_file_if_exists(&dst)?;
        copy_tolerating_race(src, &dst)
    }

    fn on_moved(&self, src: &Path, dest: &Path) -> Result<Outcome> {
        let dst_new = self.root.map(dest)?;
        let dst_old = self.root.map(src)?;

        let copied = copy_tolerating_race(dest, &dst_new)? == Outcome::Copied;

        // A rename onto itself (case-only on some filesystems) must not delete the fresh copy.
        let removed = dst_old != dst_new && remove_file_if_exists(&dst_old)?;
        let pruned = self.prune_parent(&dst_old)?;

        Ok(Outcome::Moved {
            copied,
            removed,
            pruned,
        })
    }

    fn on_deleted(&self, src: &Path) -> Result<Outcome> {
        let dst = self.root.map(src)?;

        // Some backends cannot tell whether a removed entry was a directory;
        // the mirror itself can.
        if dst.is_dir() && !dst.is_symlink() {
            debug!(path = %dst.display(), "deleted entry was a directory; skipping");
            return Ok(Outcome::SkippedDirectory);
        }

        remove_file_if_exists(&dst)?;
        let pruned = self.prune_parent(&dst)?;
        Ok(Outcome::Removed { pruned })
    }

    fn prune_parent(&self, dst: &Path) -> Result<usize> {
        match dst.parent() {
            Some(parent) => prune_upward(parent, self.root.dest_root()),
            None => Ok(0),
        }
    }

    fn record(&self, outcome: Outcome) {
        match outcome {
            Outcome::SkippedDirectory | Outcome::Ignored => self.stats.record_dropped(),
            Outcome::Copied => self.stats.record_copy(),
            Outcome::SourceVanished => self.stats.record_race(),
            Outcome::Removed { pruned } => {
                self.stats.record_remove();
                self.stats.record_pruned(pruned);
            }
            Outcome::Moved {
                copied,
                removed,
                pruned,
            } => {
                if copied {
                    self.stats.record_copy();
                } else {
                    self.stats.record_race();
                }
                if removed {
                    self.stats.record_remove();
                }
                self.stats.record_pruned(pruned);
            }
        }
    }
}

/// Copy `src` to `dst`, treating a vanished source as a benign race.
fn copy_tolerating_race(src: &Path, dst: &Path) -> Result<Outcome> {
    match copy_with_metadata(src, dst) {
        Ok(_) => Ok(Outcome::Copied),
        Err(err) if err.is_transient_race() => {
            debug!(path = %src.display(), "source vanished before copy");
            Ok(Outcome::SourceVanished)
        }
        Err(err) => Err(err),
    }
}
