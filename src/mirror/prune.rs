use std::fs;
use std::io;
use std::path::Path;

use crate::error::{MirrorAction, MirrorError, Result};

/// Remove `dir` and each ancestor left empty, stopping at `dest_root`.
///
/// Idempotent. Stops silently at a directory that no longer exists, at the
/// first non-empty directory, or once the walk reaches (or would leave)
/// `dest_root`, which itself is never removed. Returns the number of
/// directories removed.
pub fn prune_upward(dir: &Path, dest_root: &Path) -> Result<usize> {
    let root = fs::canonicalize(dest_root).unwrap_or_else(|_| dest_root.to_path_buf());
    let mut removed = 0;
    let mut current = dir.to_path_buf();

    loop {
        let canonical = match fs::canonicalize(&current) {
            Ok(path) => path,
            Err(err) if err.kind() == io::ErrorKind::NotFound => break,
            Err(err) => return Err(MirrorError::io(MirrorAction::Prune, &current, err)),
        };
        if canonical == root || !canonical.starts_with(&root) {
            break;
        }

        let mut entries = match fs::read_dir(&canonical) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => break,
            Err(err) => return Err(MirrorError::io(MirrorAction::Prune, &canonical, err)),
        };
        if entries.next().is_some() {
            break;
        }

        match fs::remove_dir_all(&canonical) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == io::ErrorKind::NotFound => break,
            Err(err) => return Err(MirrorError::io(MirrorAction::Prune, &canonical, err)),
        }

        match canonical.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    Ok(removed)
}
