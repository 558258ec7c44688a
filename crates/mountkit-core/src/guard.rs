//! Scoped acquisition of a mount.

use std::ops::Deref;

use mountkit_common::error::Result;

use crate::manager::MountManager;

/// Keeps a mount alive for a scope.
///
/// [`MountGuard::release`] unmounts and reports the result. Dropping an
/// unreleased guard also unmounts, but can only log a failure.
#[derive(Debug)]
#[must_use = "dropping the guard unmounts immediately"]
pub struct MountGuard<'a> {
    manager: &'a MountManager,
    armed: bool,
}

impl<'a> MountGuard<'a> {
    pub(crate) const fn new(manager: &'a MountManager) -> Self {
        Self {
            manager,
            armed: true,
        }
    }

    /// Unmounts now and returns the outcome.
    ///
    /// # Errors
    ///
    /// Returns whatever [`MountManager::umount`] returns.
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.manager.umount()
    }
}

impl Deref for MountGuard<'_> {
    type Target = MountManager;

    fn deref(&self) -> &Self::Target {
        self.manager
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.manager.umount() {
            tracing::warn!(error = %e, "failed to unmount at end of scope");
        }
    }
}
