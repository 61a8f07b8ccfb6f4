//! Continuous one-way directory mirror.
//!
//! Each immediate subdirectory of a source root gets its own [`SubtreeWatcher`],
//! which translates filesystem change notifications into copy, delete, move,
//! and prune actions under the matching destination subdirectory.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod output;
pub mod watcher;

pub use dispatch::RootDispatcher;
pub use mirror::{IgnoreFilter, WatchRoot};
pub use watcher::SubtreeWatcher;
pub use watcher::event::{ChangeEvent, ChangeKind};
pub use watcher::translate::EventTranslator;
