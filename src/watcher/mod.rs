pub mod event;
pub mod translate;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc as tokio_mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mirror::WatchRoot;
use crate::output::MirrorStats;

use event::{ChangeEvent, EventClassifier};
use translate::EventTranslator;

/// How long a rename source waits for its destination half before it is
/// treated as having left the watched tree.
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(50);

/// Upper bound on waiting for the notification backend to release its channel
/// after unsubscribing.
const QUIESCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Buffered raw events between the backend thread and the watcher task.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of a [`SubtreeWatcher`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    New,
    Running,
    Stopped,
}

/// Owns one [`WatchRoot`], subscribes to change notifications under its source
/// root, and feeds them one at a time, in order, to an [`EventTranslator`].
#[derive(Debug)]
pub struct SubtreeWatcher {
    translator: EventTranslator,
    cancel: CancellationToken,
    state: watch::Sender<WatcherState>,
}

impl SubtreeWatcher {
    pub fn new(root: WatchRoot, stats: Arc<MirrorStats>) -> Self {
        let (state, _) = watch::channel(WatcherState::New);
        Self {
            translator: EventTranslator::new(Arc::new(root), stats),
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn root(&self) -> &WatchRoot {
        self.translator.root()
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Wait until the watcher has subscribed and is processing events, or has stopped.
    pub async fn wait_started(&self) -> WatcherState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| *s != WatcherState::New).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Subscribe and mirror events until [`stop`](Self::stop) is called.
    ///
    /// Long-lived: returns only after the watcher has stopped. Calling it on a
    /// watcher that already started or stopped returns immediately.
    pub async fn start(&self) -> anyhow::Result<()> {
        if self.state() != WatcherState::New || self.cancel.is_cancelled() {
            return Ok(());
        }

        let source = self.root().source_root().to_path_buf();
        let (backend, mut rx) = match subscribe(&source) {
            Ok(subscription) => subscription,
            Err(err) => {
                self.state.send_replace(WatcherState::Stopped);
                return Err(err);
            }
        };

        let claimed = self.state.send_if_modified(|state| {
            if *state == WatcherState::New {
                *state = WatcherState::Running;
                true
            } else {
                false
            }
        });
        if !claimed {
            // Stopped before the subscription was in place.
            drop(backend);
            return Ok(());
        }
        info!(path = %source.display(), "watcher started");

        let mut classifier = EventClassifier::new();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                received = rx.recv() => {
                    let Some(result) = received else {
                        warn!(path = %source.display(), "notification backend closed unexpectedly");
                        break;
                    };
                    match result {
                        Ok(raw) => {
                            for change in classifier.classify(raw) {
                                self.dispatch(change).await;
                            }
                        }
                        Err(err) => {
                            warn!(path = %source.display(), error = %err, "watcher error");
                        }
                    }
                }
                _ = tokio::time::sleep(RENAME_PAIR_WINDOW), if classifier.has_pending() => {
                    if let Some(change) = classifier.flush() {
                        self.dispatch(change).await;
                    }
                }
            }
        }

        // Unsubscribe and wait for the backend thread to drop its sender, so no
        // callback is in flight once Stopped is reported. Drain while dropping:
        // some backends join their thread on drop.
        let release = tokio::task::spawn_blocking(move || drop(backend));
        let drained = tokio::time::timeout(QUIESCE_TIMEOUT, async {
            while rx.recv().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(path = %source.display(), "notification backend did not quiesce in time");
        }
        if let Err(err) = release.await {
            warn!(path = %source.display(), error = %err, "failed to release notification backend");
        }

        self.state.send_replace(WatcherState::Stopped);
        info!(path = %source.display(), "watcher stopped");
        Ok(())
    }

    /// Unsubscribe and wait until the watcher has fully stopped.
    ///
    /// Idempotent, callable from any task, and safe before [`start`](Self::start).
    pub async fn stop(&self) {
        self.cancel.cancel();

        let never_started = self.state.send_if_modified(|state| {
            if *state == WatcherState::New {
                *state = WatcherState::Stopped;
                true
            } else {
                false
            }
        });
        if never_started {
            debug!(path = %self.root().source_root().display(), "watcher stopped before start");
            return;
        }

        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s == WatcherState::Stopped).await;
    }

    /// Translate one event on the blocking pool and wait for it, keeping
    /// per-subtree processing sequential.
    async fn dispatch(&self, change: ChangeEvent) {
        let translator = self.translator.clone();
        let description = change.to_string();
        if let Err(err) = tokio::task::spawn_blocking(move || translator.handle(&change)).await {
            warn!(event = %description, error = %err, "event translation panicked");
        }
    }
}

type Subscription = (
    RecommendedWatcher,
    tokio_mpsc::Receiver<notify::Result<notify::Event>>,
);

/// Start a recursive `notify` watcher on `root`, forwarding raw events into a
/// tokio channel. Dropping the returned watcher unsubscribes.
fn subscribe(root: &Path) -> anyhow::Result<Subscription> {
    let (tx, rx) = tokio_mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        // Receiver gone means the watcher is shutting down.
        let _ = tx.blocking_send(res);
    })
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;
    Ok((watcher, rx))
}
