//! Helper executable resolution.
//!
//! Both helpers are looked up once, when the manager is built. A missing
//! helper is fatal: there is no retry and no fallback search path.

use std::path::{Path, PathBuf};

use mountkit_common::error::{MountError, Result};

/// Absolute paths of the mount and unmount helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHelpers {
    /// Foreground mount helper, e.g. `archivemount`.
    pub helper: PathBuf,
    /// Unmount helper, e.g. `fusermount`.
    pub unmount_helper: PathBuf,
}

/// Resolves a single command through the executable search path.
///
/// # Errors
///
/// Returns [`MountError::CommandNotFound`] if `command` is not an
/// executable on `PATH` (or, for a name with a separator, not an
/// executable file).
pub fn resolve_command(command: &str) -> Result<PathBuf> {
    which::which(command).map_err(|_| MountError::CommandNotFound {
        command: command.to_string(),
    })
}

/// Resolves the mount helper, then the unmount helper.
///
/// # Errors
///
/// Returns [`MountError::CommandNotFound`] naming whichever helper is
/// missing first.
pub fn resolve_helpers(helper: &str, unmount_helper: &str) -> Result<ResolvedHelpers> {
    let helper_path = resolve_command(helper)?;
    let unmount_path = resolve_command(unmount_helper)?;
    tracing::debug!(
        helper = %helper_path.display(),
        unmount_helper = %unmount_path.display(),
        "resolved mount helpers"
    );
    Ok(ResolvedHelpers {
        helper: absolute(helper_path),
        unmount_helper: absolute(unmount_path),
    })
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}

/// Returns `true` if `command` resolves to an executable.
#[must_use]
pub fn is_available(command: &str) -> bool {
    which::which(command).is_ok()
}

/// Returns the final path component of a resolved helper, for log fields.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
