use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters shared by every watcher of a run.
#[derive(Debug, Default)]
pub struct MirrorStats {
    copied: AtomicU64,
    removed: AtomicU64,
    pruned: AtomicU64,
    dropped: AtomicU64,
    races: AtomicU64,
    failures: AtomicU64,
}

impl MirrorStats {
    pub fn record_copy(&self) {
        self.copied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remove(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruned(&self, dirs: usize) {
        self.pruned.fetch_add(dirs as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_race(&self) {
        self.races.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MirrorSummary {
        MirrorSummary {
            watchers: 0,
            files_copied: self.copied.load(Ordering::Relaxed),
            files_removed: self.removed.load(Ordering::Relaxed),
            dirs_pruned: self.pruned.load(Ordering::Relaxed),
            events_dropped: self.dropped.load(Ordering::Relaxed),
            transient_races: self.races.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Aggregate statistics for a mirroring run, printed at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorSummary {
    /// Number of subtree watchers that ran.
    pub watchers: usize,
    /// Files copied into the destination (creates, modifications, and moves).
    pub files_copied: u64,
    /// Destination files removed after a delete or move.
    pub files_removed: u64,
    /// Destination directories pruned after becoming empty.
    pub dirs_pruned: u64,
    /// Events dropped because they concerned a directory or an ignored path.
    pub events_dropped: u64,
    /// Sources that vanished before they could be copied.
    pub transient_races: u64,
    /// Events whose action was abandoned after an unexpected I/O failure.
    pub failures: u64,
}

/// Print a summary of the mirroring run.
///
/// - `json = true`: emit a pretty-printed JSON object to stdout.
/// - `json = false`: emit a human-readable summary to stdout.
///
/// If `summary.failures > 0`, a pointer to the log is written to **stderr** so
/// that the stdout stream remains clean for downstream JSON consumers.
pub fn print_summary(summary: &MirrorSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serialising summary: {}", e),
        }
        return;
    }

    println!("Mirrored {} subtree(s)", summary.watchers);
    println!(
        "  {} copied, {} removed, {} directories pruned",
        summary.files_copied, summary.files_removed, summary.dirs_pruned,
    );
    println!(
        "  {} events dropped, {} transient races",
        summary.events_dropped, summary.transient_races,
    );

    if summary.failures > 0 {
        eprintln!(
            "  {} events failed (see the log for details)",
            summary.failures
        );
    }
}
