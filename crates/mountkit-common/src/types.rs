//! Domain types shared by the manager and its consumers.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a mount manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountState {
    /// No helper is running; a new mount may start.
    Idle,
    /// The helper has been launched and the mount point is not active yet.
    Mounting,
    /// The mount point is an active mount.
    Mounted,
    /// The helper exited or timed out before the mount became active.
    Failed,
}

impl MountState {
    /// Converts the compact representation used for lock-free storage.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Mounting,
            2 => Self::Mounted,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Returns the compact representation used for lock-free storage.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Mounting => 1,
            Self::Mounted => 2,
            Self::Failed => 3,
        }
    }
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Mounting => write!(f, "mounting"),
            Self::Mounted => write!(f, "mounted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of an active mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountStatus {
    /// Source handed to the helper.
    pub source: PathBuf,
    /// Directory the source is mounted on.
    pub mount_point: PathBuf,
    /// Whether the manager created the mount point and will remove it.
    pub owned: bool,
    /// Options passed to the helper.
    pub options: Vec<String>,
    /// Process id of the foreground helper.
    pub helper_pid: u32,
    /// When the mount point was first observed to be active.
    pub mounted_at: Option<DateTime<Utc>>,
}
