//! Active-mount detection.
//!
//! A directory is an active mount when it lives on a different device than
//! its parent, or when it is its own parent (a filesystem root). Symlinks
//! are never mount points, and paths that cannot be inspected report
//! `false`.

use std::path::Path;

use nix::sys::stat::{FileStat, SFlag, lstat};

/// Returns `true` if `path` currently has a filesystem attached to it.
#[must_use]
pub fn is_active_mount(path: &Path) -> bool {
    let Ok(stat) = lstat(path) else {
        return false;
    };
    if file_type(&stat) == SFlag::S_IFLNK {
        return false;
    }
    let parent = path.join("..");
    let Ok(parent_stat) = lstat(&parent) else {
        return false;
    };
    if stat.st_dev != parent_stat.st_dev {
        return true;
    }
    stat.st_ino == parent_stat.st_ino
}

fn file_type(stat: &FileStat) -> SFlag {
    SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_a_mount() {
        assert!(is_active_mount(Path::new("/")));
    }

    #[test]
    fn fresh_directory_is_not_a_mount() {
        let dir = tempfile::tempdir().expect("tempdir");
        let child = dir.path().join("child");
        std::fs::create_dir(&child).expect("mkdir");
        assert!(!is_active_mount(&child));
    }

    #[test]
    fn missing_path_is_not_a_mount() {
        assert!(!is_active_mount(Path::new("/nonexistent/mountkit/probe")));
    }

    #[test]
    fn symlink_to_root_is_not_a_mount() {
        let dir = tempfile::tempdir().expect("tempdir");
        let link = dir.path().join("root-link");
        std::os::unix::fs::symlink("/", &link).expect("symlink");
        assert!(!is_active_mount(&link));
    }

    #[test]
    fn regular_file_is_not_a_mount() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("f");
        std::fs::write(&file, "x").expect("write");
        assert!(!is_active_mount(&file));
    }
}
