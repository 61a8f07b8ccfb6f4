//! Destination-side primitives: path mapping, ignore filtering, metadata
//! preserving copies, and pruning of directories left empty.

pub mod copy;
pub mod ignore;
pub mod prune;
pub mod root;

pub use ignore::IgnoreFilter;
pub use root::WatchRoot;
