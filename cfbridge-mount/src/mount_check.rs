//! Deciding whether a path currently has a filesystem mounted on it.

use std::path::Path;

/// Answers "is something mounted at this path right now?"
pub trait MountProbe: Send + Sync {
    fn is_mounted(&self, path: &Path) -> bool;

    /// A mount whose filesystem has gone away but still holds the path
    fn is_stale(&self, _path: &Path) -> bool {
        false
    }
}

/// Probe backed by filesystem metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl MountProbe for FsProbe {
    fn is_mounted(&self, path: &Path) -> bool {
        is_mount_point(path)
    }

    fn is_stale(&self, path: &Path) -> bool {
        is_stale_mount(path)
    }
}

/// Check whether `path` is a mount point.
///
/// A directory is a mount point when it lives on a different device than its
/// parent, or when it shares its parent's inode (the root of a filesystem).
/// Symbolic links are never mount points.
#[cfg(unix)]
pub fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return false;
    };
    if meta.file_type().is_symlink() {
        return false;
    }

    // path/.. rather than Path::parent so "/" compares against itself
    let Ok(parent) = std::fs::symlink_metadata(path.join("..")) else {
        return false;
    };

    meta.dev() != parent.dev() || meta.ino() == parent.ino()
}

/// Check whether the drive letter `path` is attached.
#[cfg(windows)]
pub fn is_mount_point(path: &Path) -> bool {
    // A bare "Z:" means the current directory on Z:, so query the drive root
    let root = match path.to_str() {
        Some(drive) if drive.len() == 2 && drive.ends_with(':') => format!("{}\\", drive),
        _ => path.display().to_string(),
    };
    std::fs::metadata(root).is_ok()
}

/// Check whether `path` is held by a dead mount.
///
/// A crashed FUSE daemon leaves its mount point in place, but `lstat` on it
/// fails (`ENOTCONN`). Any failure other than not-found counts.
#[cfg(unix)]
pub fn is_stale_mount(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(_) => false,
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    }
}

#[cfg(windows)]
pub fn is_stale_mount(_path: &Path) -> bool {
    false
}
