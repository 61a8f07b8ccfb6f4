use std::io;
use std::path::{Path, PathBuf};

use crate::error::{MirrorError, Result};

use super::ignore::IgnoreFilter;

/// A (source directory, destination directory, ignore pattern) triple under
/// independent monitoring.
///
/// Both roots are canonical absolute paths. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct WatchRoot {
    source_root: PathBuf,
    dest_root: PathBuf,
    ignore: IgnoreFilter,
}

impl WatchRoot {
    /// Bind a source directory to its destination counterpart.
    ///
    /// Both paths are resolved to canonical absolute form. The destination does
    /// not need to exist yet: the deepest existing ancestor is canonicalized and
    /// the missing tail appended.
    pub fn new(source_root: &Path, dest_root: &Path, ignore: IgnoreFilter) -> io::Result<Self> {
        Ok(Self {
            source_root: resolve_absolute(source_root)?,
            dest_root: resolve_absolute(dest_root)?,
            ignore,
        })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn ignore(&self) -> &IgnoreFilter {
        &self.ignore
    }

    /// Translate a path under the source root into its destination counterpart:
    /// `dest_root + relative(path, source_root)`.
    ///
    /// Containment is checked component-wise, so `/src/proj2/x` is rejected for
    /// a source root of `/src/proj`.
    pub fn map(&self, path: &Path) -> Result<PathBuf> {
        let relative = path
            .strip_prefix(&self.source_root)
            .map_err(|_| MirrorError::OutsideWatchRoot {
                path: path.to_path_buf(),
                root: self.source_root.clone(),
            })?;
        if relative.as_os_str().is_empty() {
            return Ok(self.dest_root.clone());
        }
        Ok(self.dest_root.join(relative))
    }
}

/// Resolve `path` to an absolute canonical path, tolerating a missing tail.
///
/// Symlinks and `..` in the existing part are resolved by the OS; the
/// non-existing remainder is appended as-is.
pub fn resolve_absolute(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    loop {
        match std::fs::canonicalize(existing) {
            Ok(canonical) => {
                let mut resolved = canonical;
                for component in tail.iter().rev() {
                    resolved.push(component);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name() else {
                    return Err(err);
                };
                tail.push(name.to_os_string());
                existing = match existing.parent() {
                    Some(parent) => parent,
                    None => return Err(err),
                };
            }
            Err(err) => return Err(err),
        }
    }
}
