//! Manager configuration model.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{MountError, Result};

/// Tunables for a mount manager.
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name or path of the unmount helper.
    pub unmount_helper: String,
    /// Interval between mount readiness checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound on how long `mount()` waits for the mount to appear.
    /// `None` waits for as long as the helper keeps running.
    pub mount_timeout_ms: Option<u64>,
    /// Prefix for manager-owned temporary mount points.
    pub temp_prefix: String,
    /// Directory in which temporary mount points are created.
    /// `None` uses the system temporary directory.
    pub temp_root: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            unmount_helper: constants::DEFAULT_UNMOUNT_HELPER.to_string(),
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            mount_timeout_ms: None,
            temp_prefix: constants::DEFAULT_TEMP_PREFIX.to_string(),
            temp_root: None,
        }
    }
}

impl ManagerConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds values rejected by [`ManagerConfig::validate`].
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MountError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configured values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Config`] for an empty unmount helper name or a
    /// zero poll interval.
    pub fn validate(&self) -> Result<()> {
        if self.unmount_helper.trim().is_empty() {
            return Err(MountError::Config {
                message: "unmount_helper must not be empty".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(MountError::Config {
                message: "poll_interval_ms must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Returns the poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the mount timeout as a [`Duration`], if one is configured.
    #[must_use]
    pub fn mount_timeout(&self) -> Option<Duration> {
        self.mount_timeout_ms.map(Duration::from_millis)
    }
}
