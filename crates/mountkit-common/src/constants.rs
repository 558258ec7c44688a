//! Workspace-wide constants and defaults.

/// Application name used in CLI output.
pub const APP_NAME: &str = "mountkit";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "mountkit";

/// Mount helper used when the caller does not name one.
pub const DEFAULT_HELPER: &str = "archivemount";

/// Unmount helper resolved alongside the mount helper.
pub const DEFAULT_UNMOUNT_HELPER: &str = "fusermount";

/// Flag keeping the helper in the foreground so its lifetime is the mount's.
pub const FOREGROUND_FLAG: &str = "-f";

/// Flag preceding the comma-joined helper option string.
pub const OPTION_FLAG: &str = "-o";

/// Flag asking the unmount helper to release a mount point.
pub const UNMOUNT_FLAG: &str = "-u";

/// Interval between mount readiness checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Prefix for manager-owned temporary mount points.
pub const DEFAULT_TEMP_PREFIX: &str = "mountpoint";

/// Number of trailing helper stderr lines kept for diagnostics.
pub const STDERR_TAIL_LINES: usize = 16;

/// Name given to background worker threads.
pub const WORKER_THREAD_NAME: &str = "mount-worker";
