use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use tracing::debug;

/// Classification of a filesystem change after translation from the raw backend event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// Renamed or relocated; `dest_path` is the new location.
    Moved { dest_path: PathBuf },
}

/// One filesystem change, consumed exactly once by the event translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub is_directory: bool,
    /// The affected path; for moves, the old location.
    pub source_path: PathBuf,
}

impl ChangeEvent {
    pub fn created(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self::new(ChangeKind::Created, path, is_directory)
    }

    pub fn modified(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self::new(ChangeKind::Modified, path, is_directory)
    }

    pub fn deleted(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self::new(ChangeKind::Deleted, path, is_directory)
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self::new(
            ChangeKind::Moved {
                dest_path: to.into(),
            },
            from,
            is_directory,
        )
    }

    fn new(kind: ChangeKind, path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind,
            is_directory,
            source_path: path.into(),
        }
    }

    /// The new location of a moved entry.
    pub fn dest_path(&self) -> Option<&Path> {
        match &self.kind {
            ChangeKind::Moved { dest_path } => Some(dest_path),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Moved { .. } => "moved",
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {}, src: {}",
            self.kind_name(),
            self.source_path.display()
        )?;
        if let Some(dest) = self.dest_path() {
            write!(f, ", dest: {}", dest.display())?;
        }
        Ok(())
    }
}

/// A rename source waiting for its matching destination half.
#[derive(Debug)]
struct PendingRename {
    tracker: Option<usize>,
    path: PathBuf,
}

/// Turns raw `notify` events into [`ChangeEvent`]s.
///
/// Backends that report renames as separate `From`/`To` halves are paired by
/// tracker into a single move. A `From` without a partner means the entry left
/// the watched tree and becomes a delete; a `To` without a partner means it
/// entered the tree and becomes a create. Stateful: one classifier per watcher.
///
/// A directory that is created, moved in, or renamed arrives as a single event
/// even though every file beneath it changed. Such events are followed by one
/// file-level create or move per file found under the directory's current
/// location.
#[derive(Debug, Default)]
pub struct EventClassifier {
    pending: Option<PendingRename>,
    /// Tracker of the last rename assembled from halves, so the backend's own
    /// combined `Both` event for it is not applied twice.
    paired: Option<usize>,
}

impl EventClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a rename source is waiting for its destination half.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Give up on the pending rename source: it left the watched tree.
    pub fn flush(&mut self) -> Option<ChangeEvent> {
        self.pending
            .take()
            .map(|pending| ChangeEvent::deleted(pending.path, false))
    }

    pub fn classify(&mut self, event: Event) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        for change in self.classify_raw(event) {
            let files = expand_directory(&change);
            out.push(change);
            out.extend(files);
        }
        out
    }

    fn classify_raw(&mut self, event: Event) -> Vec<ChangeEvent> {
        let tracker = event.tracker();
        let mut out = Vec::new();

        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.paired = None;
                out.extend(self.flush());
                if let Some(path) = event.paths.into_iter().next() {
                    self.pending = Some(PendingRename { tracker, path });
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                self.paired = None;
                let Some(to) = event.paths.into_iter().next() else {
                    return out;
                };
                match self.pending.take() {
                    Some(from) if from.tracker.is_some() && from.tracker == tracker => {
                        self.paired = tracker;
                        let is_dir = to.is_dir();
                        out.push(ChangeEvent::moved(from.path, to, is_dir));
                    }
                    unmatched => {
                        if let Some(from) = unmatched {
                            out.push(ChangeEvent::deleted(from.path, false));
                        }
                        let is_dir = to.is_dir();
                        out.push(ChangeEvent::created(to, is_dir));
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if tracker.is_some() && self.paired == tracker {
                    self.paired = None;
                    return out;
                }
                self.paired = None;
                match self.pending.take() {
                    Some(from) if from.tracker.is_some() && from.tracker == tracker => {}
                    unmatched => self.pending = unmatched,
                }
                out.extend(self.flush());
                let mut paths = event.paths.into_iter();
                if let (Some(from), Some(to)) = (paths.next(), paths.next()) {
                    let is_dir = to.is_dir();
                    out.push(ChangeEvent::moved(from, to, is_dir));
                }
            }
            kind => {
                self.paired = None;
                out.extend(self.flush());
                for path in event.paths {
                    if let Some(change) = classify_single(&kind, path) {
                        out.push(change);
                    }
                }
            }
        }

        out
    }
}

/// File-level events standing in for a directory create or move; empty for
/// anything else.
fn expand_directory(change: &ChangeEvent) -> Vec<ChangeEvent> {
    if !change.is_directory {
        return Vec::new();
    }
    let root = &change.source_path;
    match &change.kind {
        ChangeKind::Created => files_under(root)
            .into_iter()
            .map(|rel| ChangeEvent::created(root.join(rel), false))
            .collect(),
        ChangeKind::Moved { dest_path } => files_under(dest_path)
            .into_iter()
            .map(|rel| ChangeEvent::moved(root.join(&rel), dest_path.join(&rel), false))
            .collect(),
        ChangeKind::Modified | ChangeKind::Deleted => Vec::new(),
    }
}

/// Every non-directory entry beneath `dir`, relative to it, sorted. Hidden and
/// VCS-ignored files are included: the mirror copies everything.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(dir)
        .standard_filters(false)
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                debug!(path = %dir.display(), error = %err, "failed to walk directory");
                continue;
            }
        };
        if entry.file_type().is_none_or(|ft| ft.is_dir()) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(dir) {
            files.push(rel.to_path_buf());
        }
    }
    files.sort();
    files
}

/// Classify a non-rename-pair event for one of its paths, or `None` if the kind
/// is not relevant to mirroring.
fn classify_single(kind: &EventKind, path: PathBuf) -> Option<ChangeEvent> {
    match kind {
        EventKind::Create(CreateKind::File) => Some(ChangeEvent::created(path, false)),
        EventKind::Create(CreateKind::Folder) => Some(ChangeEvent::created(path, true)),
        EventKind::Create(_) => {
            let is_dir = path.is_dir();
            Some(ChangeEvent::created(path, is_dir))
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Platforms without rename trackers report each side on its own.
            if path.exists() {
                let is_dir = path.is_dir();
                Some(ChangeEvent::created(path, is_dir))
            } else {
                Some(ChangeEvent::deleted(path, false))
            }
        }
        EventKind::Modify(_) => {
            let is_dir = path.is_dir();
            Some(ChangeEvent::modified(path, is_dir))
        }
        EventKind::Remove(RemoveKind::Folder) => Some(ChangeEvent::deleted(path, true)),
        EventKind::Remove(_) => Some(ChangeEvent::deleted(path, false)),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}
