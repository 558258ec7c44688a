//! Mount point provisioning.
//!
//! A caller-supplied directory is validated and borrowed; otherwise a
//! fresh temporary directory is created and owned. Ownership of that
//! directory moves into the worker, which removes it when the helper
//! exits.

use std::path::{Path, PathBuf};

use mountkit_common::error::{MountError, Result};
use tempfile::TempDir;

/// A directory ready to receive a mount.
#[derive(Debug)]
pub enum MountPoint {
    /// Created by the manager; removed when the worker finishes.
    Owned(TempDir),
    /// Supplied by the caller; never removed by the manager.
    Borrowed(PathBuf),
}

impl MountPoint {
    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Owned(dir) => dir.path(),
            Self::Borrowed(path) => path,
        }
    }

    /// Returns `true` if the manager created this directory.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Releases the mount point, removing it if it is manager-owned.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from removing an owned directory.
    pub fn release(self) -> std::io::Result<()> {
        match self {
            Self::Owned(dir) => dir.close(),
            Self::Borrowed(_) => Ok(()),
        }
    }
}

/// Where and how temporary mount points are created.
#[derive(Debug, Clone)]
pub struct Provisioner {
    prefix: String,
    root: Option<PathBuf>,
}

impl Provisioner {
    /// Creates a provisioner for temporary directories named `<prefix>XXXXXX`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, root: Option<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            root,
        }
    }

    /// Validates `requested` or allocates a temporary directory.
    ///
    /// A requested directory is returned in canonical form, with symlinks
    /// resolved. Nothing on disk changes when validation fails.
    ///
    /// # Errors
    ///
    /// - [`MountError::NotFound`] if `requested` does not exist.
    /// - [`MountError::NotADirectory`] if it is not a directory.
    /// - [`MountError::NotEmptyMountPoint`] if it has entries.
    /// - [`MountError::Io`] if it cannot be read or the temporary
    ///   directory cannot be created.
    pub fn provision(&self, requested: Option<&Path>) -> Result<MountPoint> {
        match requested {
            Some(path) => validate_mount_point(path).map(MountPoint::Borrowed),
            None => self.allocate().map(MountPoint::Owned),
        }
    }

    fn allocate(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        let _ = builder.prefix(&self.prefix);
        let root = self.root.clone().unwrap_or_else(std::env::temp_dir);
        let dir = builder.tempdir_in(&root).map_err(|e| MountError::Io {
            path: root.clone(),
            source: e,
        })?;
        tracing::debug!(mount_point = %dir.path().display(), "allocated temporary mount point");
        Ok(dir)
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new(mountkit_common::constants::DEFAULT_TEMP_PREFIX, None)
    }
}

fn validate_mount_point(path: &Path) -> Result<PathBuf> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MountError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            MountError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    if !metadata.is_dir() {
        return Err(MountError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    let mut entries = std::fs::read_dir(path).map_err(|e| MountError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if entries.next().is_some() {
        return Err(MountError::NotEmptyMountPoint {
            path: path.to_path_buf(),
        });
    }
    // The helper mounts on the link target; the active-mount check must look
    // at the same directory.
    std::fs::canonicalize(path).map_err(|e| MountError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_owned_directory_with_prefix() {
        let root = tempfile::tempdir().expect("tempdir");
        let provisioner = Provisioner::new("mountpoint", Some(root.path().to_path_buf()));
        let mp = provisioner.provision(None).expect("provision");

        assert!(mp.is_owned());
        assert!(mp.path().is_dir());
        assert!(mp.path().starts_with(root.path()));
        let name = mp.path().file_name().expect("name").to_string_lossy().into_owned();
        assert!(name.starts_with("mountpoint"));
    }

    #[test]
    fn release_removes_owned_directory() {
        let mp = Provisioner::default().provision(None).expect("provision");
        let path = mp.path().to_path_buf();
        mp.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn empty_directory_is_borrowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mp = Provisioner::default()
            .provision(Some(dir.path()))
            .expect("provision");
        assert!(!mp.is_owned());
        assert_eq!(mp.path(), std::fs::canonicalize(dir.path()).expect("canonical"));
        mp.release().expect("release");
        assert!(dir.path().is_dir());
    }

    #[test]
    fn symlinked_directory_resolves_to_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let real = dir.path().join("real");
        std::fs::create_dir(&real).expect("mkdir");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).expect("symlink");

        let mp = Provisioner::default().provision(Some(&link)).expect("provision");

        assert_eq!(mp.path(), std::fs::canonicalize(&real).expect("canonical"));
        assert!(!mp.path().ends_with("link"));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent");
        let err = Provisioner::default().provision(Some(&missing)).unwrap_err();
        assert!(matches!(err, MountError::NotFound { path } if path == missing));
        assert!(!missing.exists());
    }

    #[test]
    fn regular_file_is_not_a_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("file");
        std::fs::write(&file, "x").expect("write");
        let err = Provisioner::default().provision(Some(&file)).unwrap_err();
        assert!(matches!(err, MountError::NotADirectory { .. }));
    }

    #[test]
    fn non_empty_directory_is_rejected_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("keep.txt"), "data").expect("write");
        let err = Provisioner::default().provision(Some(dir.path())).unwrap_err();
        assert!(matches!(err, MountError::NotEmptyMountPoint { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("keep.txt")).expect("read"),
            "data"
        );
    }
}
