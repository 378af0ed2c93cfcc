//! Atomic file writes and hardlinking
//!
//! Files are written to a uniquely-named temp file in the destination's
//! directory (same filesystem, so the rename is atomic), timestamped, and
//! then renamed over the destination. Readers see either no file or the
//! complete file.

use crate::error::WriteError;
use std::fs::{self, FileTimes};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Write `content` to `destination` in one commit
///
/// Parent directories are created as needed. When `modified` is given it is
/// applied as the file's modification time (and creation time on platforms
/// that support setting it) before the file becomes visible.
pub fn write_atomic(
    content: &[u8],
    destination: &Path,
    modified: Option<SystemTime>,
) -> Result<(), WriteError> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| WriteError::InvalidPath {
            path: destination.to_path_buf(),
        })?;
    fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;

    let io_err = |source| WriteError::Io {
        path: destination.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(content).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    if let Some(time) = modified {
        tmp.as_file().set_times(file_times(time)).map_err(io_err)?;
    }

    tmp.persist(destination)
        .map_err(|e| WriteError::Commit {
            path: destination.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

fn file_times(time: SystemTime) -> FileTimes {
    let times = FileTimes::new().set_accessed(time).set_modified(time);
    #[cfg(windows)]
    let times = {
        use std::os::windows::fs::FileTimesExt;
        times.set_created(time)
    };
    #[cfg(target_os = "macos")]
    let times = {
        use std::os::macos::fs::FileTimesExt;
        times.set_created(time)
    };
    times
}

/// Whether `link` can be created as a hardlink to `target`
///
/// Requires the target to exist as a regular file and, on Unix, to live on
/// the same device as the directory that will hold the link.
pub fn can_hard_link(target: &Path, link: &Path) -> bool {
    let Ok(target_meta) = fs::metadata(target) else {
        return false;
    };
    if !target_meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let Some(link_dir) = existing_ancestor(link) else {
            return false;
        };
        match fs::metadata(&link_dir) {
            Ok(dir_meta) => dir_meta.dev() == target_meta.dev(),
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        existing_ancestor(link).is_some()
    }
}

/// Nearest existing ancestor directory of a path
fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .find(|p| p.is_dir())
        .map(Path::to_path_buf)
}

/// Create `link` as a hardlink to `target`, creating parent directories
pub fn hard_link(target: &Path, link: &Path) -> Result<(), WriteError> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::hard_link(target, link).map_err(|source| WriteError::Io {
        path: link.to_path_buf(),
        source,
    })
}
