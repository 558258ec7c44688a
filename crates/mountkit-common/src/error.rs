//! Unified error type for the mountkit workspace.
//!
//! Every failure the manager can report is a variant here, carrying its
//! context as structured fields. Nothing is retried internally.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error returned by every mount manager operation.
#[derive(Debug, Error)]
pub enum MountError {
    /// The mount helper or the unmount helper is not on the search path.
    #[error("{command} not found")]
    CommandNotFound {
        /// Name of the command that could not be resolved.
        command: String,
    },

    /// `mount()` was called while a mount or worker is still active.
    #[error("already mounted at {}", mount_point.display())]
    AlreadyMounted {
        /// Mount point of the active mount.
        mount_point: PathBuf,
    },

    /// A source path or caller-supplied mount point does not exist.
    #[error("no such file or directory: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A caller-supplied mount point exists but is not a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A caller-supplied mount point is a directory with entries in it.
    #[error("mount point is not empty: {}", path.display())]
    NotEmptyMountPoint {
        /// The offending path.
        path: PathBuf,
    },

    /// The helper exited before the mount point became active, or a
    /// nonzero exit code from an earlier attempt is still recorded.
    #[error(
        "mounting {} with options [{}] failed with exit code {code}{}",
        source_path.display(),
        options.join(","),
        format_stderr(stderr)
    )]
    MountFailed {
        /// Source that was being mounted.
        source_path: PathBuf,
        /// Options passed to the helper.
        options: Vec<String>,
        /// Helper exit code (`-signo` when killed by a signal).
        code: i32,
        /// Trailing stderr lines emitted by the helper.
        stderr: Vec<String>,
    },

    /// The unmount helper exited nonzero.
    #[error("unmounting {} failed with exit code {code}{}", mount_point.display(), format_stderr(stderr))]
    UmountFailed {
        /// Mount point that could not be released.
        mount_point: PathBuf,
        /// Unmount helper exit code.
        code: i32,
        /// Stderr emitted by the unmount helper.
        stderr: Vec<String>,
    },

    /// `umount()` found nothing mounted.
    #[error("not mounted{}", mount_point.as_ref().map(|p| format!(": {}", p.display())).unwrap_or_default())]
    NotMounted {
        /// Mount point that was expected to be active, if one is known.
        mount_point: Option<PathBuf>,
    },

    /// The configured mount timeout elapsed before the mount became active.
    #[error("mounting {} did not complete within {timeout:?}", source_path.display())]
    MountTimeout {
        /// Source that was being mounted.
        source_path: PathBuf,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// An I/O operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The manager state lock was poisoned by a panicking thread.
    #[error("mount manager lock poisoned")]
    LockPoisoned,

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

fn format_stderr(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!(": {}", lines.join(" | "))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MountError>;
