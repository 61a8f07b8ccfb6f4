use std::fs;
use std::io;
use std::path::Path;

use filetime::{FileTime, set_file_times};

use crate::error::{MirrorAction, MirrorError, Result};

/// Copy `src` to `dst` preserving content, permission bits, and access and
/// modification times.
///
/// Missing ancestors of `dst` are created first. A `src` that no longer exists
/// is reported as [`MirrorError::SourceVanished`].
pub fn copy_with_metadata(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| MirrorError::io(MirrorAction::CreateDir, parent, err))?;
    }

    let bytes = fs::copy(src, dst).map_err(|err| classify_copy_error(src, dst, err))?;

    let metadata = fs::metadata(src).map_err(|err| classify_copy_error(src, dst, err))?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    set_file_times(dst, atime, mtime).map_err(|err| MirrorError::io(MirrorAction::Copy, dst, err))?;

    Ok(bytes)
}

/// Remove the file at `path`. Returns `false` if it was already gone.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(MirrorError::io(MirrorAction::Remove, path, err)),
    }
}

fn classify_copy_error(src: &Path, dst: &Path, err: io::Error) -> MirrorError {
    if err.kind() == io::ErrorKind::NotFound && fs::symlink_metadata(src).is_err() {
        MirrorError::SourceVanished(src.to_path_buf())
    } else {
        MirrorError::io(MirrorAction::Copy, dst, err)
    }
}
