use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::mirror::{IgnoreFilter, WatchRoot};
use crate::output::{MirrorStats, MirrorSummary};
use crate::watcher::SubtreeWatcher;

/// Runs one [`SubtreeWatcher`] per immediate subdirectory of the source root.
#[derive(Debug)]
pub struct RootDispatcher {
    source_root: PathBuf,
    dest_root: PathBuf,
    ignore: IgnoreFilter,
    stats: Arc<MirrorStats>,
}

impl RootDispatcher {
    pub fn new(source_root: PathBuf, dest_root: PathBuf, ignore: IgnoreFilter) -> Self {
        Self {
            source_root,
            dest_root,
            ignore,
            stats: Arc::new(MirrorStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MirrorStats> {
        Arc::clone(&self.stats)
    }

    /// Pair each immediate subdirectory of the source root with the same-named
    /// directory under the destination root, sorted by name.
    ///
    /// Destination subdirectories are not created here; the first copy into a
    /// subtree creates its root.
    pub fn discover(&self) -> anyhow::Result<Vec<WatchRoot>> {
        let mut names = subdirectory_names(&self.source_root)?;
        names.sort();

        names
            .into_iter()
            .map(|name| {
                let source = self.source_root.join(&name);
                let dest = self.dest_root.join(&name);
                WatchRoot::new(&source, &dest, self.ignore.clone())
                    .with_context(|| format!("failed to resolve watch root {}", source.display()))
            })
            .collect()
    }

    /// Start every watcher concurrently and mirror until `shutdown` resolves,
    /// then stop all watchers and wait for each to finish.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<MirrorSummary>
    where
        F: Future<Output = ()>,
    {
        let roots = self.discover()?;
        Ok(self.run_roots(roots, shutdown).await)
    }

    /// Like [`run_until`](Self::run_until), over an already discovered set of roots.
    ///
    /// A watcher that cannot subscribe is logged and counted as a failure as
    /// soon as it fails; the others keep running.
    pub async fn run_roots<F>(&self, roots: Vec<WatchRoot>, shutdown: F) -> MirrorSummary
    where
        F: Future<Output = ()>,
    {
        let watchers: Vec<Arc<SubtreeWatcher>> = roots
            .into_iter()
            .map(|root| Arc::new(SubtreeWatcher::new(root, self.stats())))
            .collect();

        info!(
            source = %self.source_root.display(),
            destination = %self.dest_root.display(),
            watchers = watchers.len(),
            "starting mirror"
        );

        let mut tasks = JoinSet::new();
        for watcher in &watchers {
            let watcher = Arc::clone(watcher);
            let stats = self.stats();
            tasks.spawn(async move {
                if let Err(err) = watcher.start().await {
                    stats.record_failure();
                    warn!(
                        path = %watcher.root().source_root().display(),
                        error = %format!("{err:#}"),
                        "watcher failed; subtree is not mirrored"
                    );
                }
            });
        }

        shutdown.await;
        info!("shutting down, stopping {} watcher(s)", watchers.len());

        for watcher in &watchers {
            watcher.stop().await;
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "watcher task panicked");
            }
        }

        let mut summary = self.stats.snapshot();
        summary.watchers = watchers.len();
        summary
    }
}

/// Names of the immediate subdirectories of `root`, following symlinks.
fn subdirectory_names(root: &Path) -> anyhow::Result<Vec<std::ffi::OsString>> {
    let entries =
        std::fs::read_dir(root).with_context(|| format!("failed to list {}", root.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", root.display()))?;
        if entry.path().is_dir() {
            names.push(entry.file_name());
        }
    }
    Ok(names)
}
