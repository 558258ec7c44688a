//! Fluent description of a mount attempt.

use std::path::{Path, PathBuf};

/// What to mount, how, and where.
///
/// ```rust
/// use mountkit_core::request::MountRequest;
///
/// let request = MountRequest::new("/tmp/sample.cbz")
///     .option("ro")
///     .mount_point("/mnt/comic");
/// assert_eq!(request.options_list(), ["ro"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    source: PathBuf,
    options: Vec<String>,
    mount_point: Option<PathBuf>,
}

impl MountRequest {
    /// Starts a request for `source` with no options and a temporary
    /// mount point.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            options: Vec::new(),
            mount_point: None,
        }
    }

    /// Appends one helper option, e.g. `ro`.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Appends several helper options in order.
    #[must_use]
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    /// Mounts on a caller-owned directory instead of a temporary one.
    /// The directory must exist and be empty.
    #[must_use]
    pub fn mount_point(mut self, path: impl Into<PathBuf>) -> Self {
        self.mount_point = Some(path.into());
        self
    }

    /// Source to mount.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Helper options in the order they were added.
    #[must_use]
    pub fn options_list(&self) -> &[String] {
        &self.options
    }

    /// Caller-owned mount point, if one was requested.
    #[must_use]
    pub fn requested_mount_point(&self) -> Option<&Path> {
        self.mount_point.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_temporary_mount_point() {
        let request = MountRequest::new("/tmp/a.zip");
        assert_eq!(request.source(), Path::new("/tmp/a.zip"));
        assert!(request.options_list().is_empty());
        assert!(request.requested_mount_point().is_none());
    }

    #[test]
    fn options_keep_insertion_order() {
        let request = MountRequest::new("/tmp/a.zip")
            .option("ro")
            .options(["nosuid", "nodev"]);
        assert_eq!(request.options_list(), ["ro", "nosuid", "nodev"]);
    }

    #[test]
    fn mount_point_is_recorded() {
        let request = MountRequest::new("/tmp/b.tar").mount_point("/mnt/b");
        assert_eq!(request.requested_mount_point(), Some(Path::new("/mnt/b")));
    }
}
