//! The mount manager: one foreground helper mount at a time.
//!
//! `mount()` and `umount()` run entirely under the manager's lock. The
//! worker thread reports back only through its completion channel and the
//! shared mounted flag, so every other field is written from the caller's
//! side. A helper that exits on its own is reaped by the next call that
//! takes the lock.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mountkit_common::config::ManagerConfig;
use mountkit_common::error::{MountError, Result};
use mountkit_common::types::{MountState, MountStatus};

use crate::command::HelperCommand;
use crate::guard::MountGuard;
use crate::probe::is_active_mount;
use crate::provision::Provisioner;
use crate::request::MountRequest;
use crate::resolver::{self, ResolvedHelpers};
use crate::worker::{MountWorker, WorkerExit, exit_code};

/// Mounts a source through an external foreground helper and tears it
/// down again.
///
/// ```rust,no_run
/// use mountkit_core::manager::MountManager;
/// use mountkit_core::request::MountRequest;
///
/// # fn main() -> mountkit_common::error::Result<()> {
/// let manager = MountManager::new("archivemount")?;
/// manager.mount(MountRequest::new("/tmp/sample.cbz").option("ro"))?;
/// if let Some(dir) = manager.mount_point() {
///     for entry in std::fs::read_dir(dir).into_iter().flatten().flatten() {
///         tracing::info!(name = ?entry.file_name(), "entry");
///     }
/// }
/// manager.umount()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MountManager {
    helpers: ResolvedHelpers,
    config: ManagerConfig,
    provisioner: Provisioner,
    inner: Mutex<Inner>,
    mounted: Arc<AtomicBool>,
    state: AtomicU8,
}

#[derive(Debug, Default)]
struct Inner {
    active: Option<ActiveMount>,
    last_exit: Option<ExitRecord>,
}

#[derive(Debug)]
struct ActiveMount {
    source: PathBuf,
    mount_point: PathBuf,
    owned: bool,
    options: Vec<String>,
    mounted_at: Option<DateTime<Utc>>,
    worker: MountWorker,
}

/// Exit of the most recent helper, kept until the next `mount()`.
#[derive(Debug, Clone)]
struct ExitRecord {
    source: PathBuf,
    options: Vec<String>,
    code: i32,
    stderr: Vec<String>,
}

impl ExitRecord {
    fn into_mount_failed(self) -> MountError {
        MountError::MountFailed {
            source_path: self.source,
            options: self.options,
            code: self.code,
            stderr: self.stderr,
        }
    }
}

enum PollOutcome {
    Mounted,
    Exited(WorkerExit),
    TimedOut(Duration),
    Pending,
}

impl MountManager {
    /// Resolves `helper` and the default unmount helper.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::CommandNotFound`] if either helper is missing.
    pub fn new(helper: &str) -> Result<Self> {
        Self::with_config(helper, ManagerConfig::default())
    }

    /// Resolves `helper` and the configured unmount helper.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Config`] for an invalid configuration and
    /// [`MountError::CommandNotFound`] if either helper is missing.
    pub fn with_config(helper: &str, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        let helpers = resolver::resolve_helpers(helper, &config.unmount_helper)?;
        tracing::info!(
            helper = %helpers.helper.display(),
            unmount_helper = %helpers.unmount_helper.display(),
            "mount manager ready"
        );
        let provisioner = Provisioner::new(config.temp_prefix.clone(), config.temp_root.clone());
        Ok(Self {
            helpers,
            config,
            provisioner,
            inner: Mutex::new(Inner::default()),
            mounted: Arc::new(AtomicBool::new(false)),
            state: AtomicU8::new(MountState::Idle.as_u8()),
        })
    }

    /// Mounts `request.source()` and blocks until the mount point is an
    /// active mount or the helper gives up.
    ///
    /// Returns the manager so calls can be chained.
    ///
    /// # Errors
    ///
    /// - [`MountError::AlreadyMounted`] if a helper is still running.
    /// - [`MountError::NotFound`] if the source or requested mount point
    ///   is missing.
    /// - [`MountError::NotADirectory`] / [`MountError::NotEmptyMountPoint`]
    ///   for an unusable requested mount point.
    /// - [`MountError::MountFailed`] if the helper exits before the mount
    ///   appears, whatever its exit code.
    /// - [`MountError::MountTimeout`] if the configured timeout elapses.
    /// - [`MountError::Io`] if the helper cannot be started.
    pub fn mount(&self, request: MountRequest) -> Result<&Self> {
        let mut inner = self.lock()?;
        self.reap(&mut inner);

        if let Some(active) = &inner.active {
            return Err(MountError::AlreadyMounted {
                mount_point: active.mount_point.clone(),
            });
        }
        if !request.source().exists() {
            return Err(MountError::NotFound {
                path: request.source().to_path_buf(),
            });
        }

        inner.last_exit = None;
        let mount_point = self
            .provisioner
            .provision(request.requested_mount_point())?;
        let command = HelperCommand::mount(
            &self.helpers.helper,
            request.options_list(),
            request.source(),
            mount_point.path(),
        );
        let mount_path = mount_point.path().to_path_buf();
        let owned = mount_point.is_owned();

        tracing::info!(command = %command, "launching mount helper");
        let worker = MountWorker::launch(&command, mount_point, Arc::clone(&self.mounted))?;
        self.set_state(MountState::Mounting);

        inner.active = Some(ActiveMount {
            source: request.source().to_path_buf(),
            mount_point: mount_path,
            owned,
            options: request.options_list().to_vec(),
            mounted_at: None,
            worker,
        });

        self.await_mount(&mut inner)?;
        Ok(self)
    }

    /// Unmounts the active mount and waits for the helper to exit.
    ///
    /// # Errors
    ///
    /// - [`MountError::MountFailed`] if the last helper exited nonzero and
    ///   no `mount()` has happened since.
    /// - [`MountError::NotMounted`] if nothing is mounted, or the mount
    ///   point is no longer an active mount.
    /// - [`MountError::UmountFailed`] if the unmount helper exits nonzero.
    /// - [`MountError::Io`] if the unmount helper cannot be started, or
    ///   the temporary mount point could not be removed afterwards.
    pub fn umount(&self) -> Result<()> {
        let mut inner = self.lock()?;
        self.reap(&mut inner);

        if let Some(record) = inner.last_exit.as_ref().filter(|r| r.code != 0) {
            return Err(record.clone().into_mount_failed());
        }
        let Some(active) = inner.active.as_ref() else {
            return Err(MountError::NotMounted { mount_point: None });
        };
        if !self.is_mounted() || !is_active_mount(&active.mount_point) {
            return Err(MountError::NotMounted {
                mount_point: Some(active.mount_point.clone()),
            });
        }

        let mount_point = active.mount_point.clone();
        self.run_unmount_helper(&mount_point)?;
        tracing::info!(mount_point = %mount_point.display(), "unmount requested, waiting for helper");

        let Some(active) = inner.active.take() else {
            return Err(MountError::NotMounted {
                mount_point: Some(mount_point),
            });
        };
        let exit = active.worker.wait();
        let cleanup_error = Self::record_exit(&mut inner, active.source, active.options, exit);
        self.set_state(MountState::Idle);
        tracing::info!(mount_point = %mount_point.display(), "unmounted");

        match cleanup_error {
            Some((path, source)) => Err(MountError::Io { path, source }),
            None => Ok(()),
        }
    }

    /// Lock-free view of whether a helper is running.
    ///
    /// The answer may already be stale when the caller acts on it.
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Current lifecycle state, read without taking the lock.
    pub fn state(&self) -> MountState {
        let state = MountState::from_u8(self.state.load(Ordering::SeqCst));
        if state == MountState::Mounted && !self.is_mounted() {
            MountState::Idle
        } else {
            state
        }
    }

    /// Snapshot of the active mount, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::LockPoisoned`] if the state lock is poisoned.
    pub fn status(&self) -> Result<Option<MountStatus>> {
        let mut inner = self.lock()?;
        self.reap(&mut inner);
        Ok(inner.active.as_ref().map(|a| MountStatus {
            source: a.source.clone(),
            mount_point: a.mount_point.clone(),
            owned: a.owned,
            options: a.options.clone(),
            helper_pid: a.worker.pid(),
            mounted_at: a.mounted_at,
        }))
    }

    /// Directory the source is mounted on, while a helper is running.
    pub fn mount_point(&self) -> Option<PathBuf> {
        self.status().ok().flatten().map(|s| s.mount_point)
    }

    /// Source being mounted, while a helper is running.
    pub fn source(&self) -> Option<PathBuf> {
        self.status().ok().flatten().map(|s| s.source)
    }

    /// Exit code of the most recent helper since the last `mount()`.
    pub fn last_exit_code(&self) -> Option<i32> {
        let mut inner = self.inner.lock().ok()?;
        self.reap(&mut inner);
        inner.last_exit.as_ref().map(|r| r.code)
    }

    /// Resolved mount helper.
    pub fn helper_path(&self) -> &Path {
        &self.helpers.helper
    }

    /// Resolved unmount helper.
    pub fn unmount_helper_path(&self) -> &Path {
        &self.helpers.unmount_helper
    }

    /// Configuration this manager was built with.
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Mounts and returns a guard that unmounts when released or dropped.
    ///
    /// # Errors
    ///
    /// Same as [`MountManager::mount`].
    pub fn mount_guarded(&self, request: MountRequest) -> Result<MountGuard<'_>> {
        let _ = self.mount(request)?;
        Ok(MountGuard::new(self))
    }

    /// Mounts, runs `f`, and unmounts on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the error from mounting, or from unmounting after `f`
    /// returned.
    pub fn scoped<R>(&self, request: MountRequest, f: impl FnOnce(&Self) -> R) -> Result<R> {
        let guard = self.mount_guarded(request)?;
        let value = f(&guard);
        guard.release()?;
        Ok(value)
    }

    fn await_mount(&self, inner: &mut Inner) -> Result<()> {
        let started = Instant::now();
        let poll = self.config.poll_interval();
        let timeout = self.config.mount_timeout();

        loop {
            let outcome = match inner.active.as_mut() {
                None => return Err(MountError::NotMounted { mount_point: None }),
                Some(active) => Self::poll_once(active, started, poll, timeout),
            };
            match outcome {
                PollOutcome::Pending => {}
                PollOutcome::Mounted => {
                    if let Some(active) = inner.active.as_mut() {
                        active.mounted_at = Some(Utc::now());
                        tracing::info!(
                            source = %active.source.display(),
                            mount_point = %active.mount_point.display(),
                            pid = active.worker.pid(),
                            "mounted"
                        );
                    }
                    self.set_state(MountState::Mounted);
                    return Ok(());
                }
                PollOutcome::Exited(exit) => return Err(self.fail_pending(inner, exit)),
                PollOutcome::TimedOut(limit) => return Err(self.abort_pending(inner, limit)),
            }
        }
    }

    fn poll_once(
        active: &mut ActiveMount,
        started: Instant,
        poll: Duration,
        timeout: Option<Duration>,
    ) -> PollOutcome {
        if is_active_mount(&active.mount_point) {
            return PollOutcome::Mounted;
        }
        let wait = match timeout {
            Some(limit) => {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return PollOutcome::TimedOut(limit);
                }
                poll.min(limit - elapsed)
            }
            None => poll,
        };
        match active.worker.poll(wait) {
            Some(exit) => PollOutcome::Exited(exit),
            None => {
                tracing::debug!(mount_point = %active.mount_point.display(), "waiting for mount");
                PollOutcome::Pending
            }
        }
    }

    /// The helper exited before the mount became active.
    fn fail_pending(&self, inner: &mut Inner, exit: WorkerExit) -> MountError {
        self.set_state(MountState::Failed);
        let Some(active) = inner.active.take() else {
            return MountError::NotMounted { mount_point: None };
        };
        let code = exit.code;
        let stderr = exit.stderr_tail.clone();
        warn_cleanup(Self::record_exit(
            inner,
            active.source.clone(),
            active.options.clone(),
            exit,
        ));
        self.set_state(MountState::Idle);
        tracing::warn!(
            source = %active.source.display(),
            code,
            "mount helper exited before mounting"
        );
        MountError::MountFailed {
            source_path: active.source,
            options: active.options,
            code,
            stderr,
        }
    }

    /// The mount timeout elapsed; stop the helper and wait for cleanup.
    fn abort_pending(&self, inner: &mut Inner, limit: Duration) -> MountError {
        self.set_state(MountState::Failed);
        let Some(active) = inner.active.take() else {
            return MountError::NotMounted { mount_point: None };
        };
        tracing::warn!(
            source = %active.source.display(),
            timeout = ?limit,
            "mount timed out, terminating helper"
        );
        active.worker.terminate();
        let exit = active.worker.wait();
        warn_cleanup(Self::record_exit(inner, active.source.clone(), active.options, exit));
        self.set_state(MountState::Idle);
        MountError::MountTimeout {
            source_path: active.source,
            timeout: limit,
        }
    }

    /// Consumes a completion message from a helper that exited on its own.
    fn reap(&self, inner: &mut Inner) {
        let Some(exit) = inner.active.as_mut().and_then(|a| a.worker.try_poll()) else {
            return;
        };
        let Some(active) = inner.active.take() else {
            return;
        };
        tracing::info!(
            mount_point = %active.mount_point.display(),
            code = exit.code,
            "mount helper exited on its own"
        );
        warn_cleanup(Self::record_exit(inner, active.source, active.options, exit));
        self.set_state(MountState::Idle);
    }

    fn record_exit(
        inner: &mut Inner,
        source: PathBuf,
        options: Vec<String>,
        exit: WorkerExit,
    ) -> Option<(PathBuf, std::io::Error)> {
        inner.last_exit = Some(ExitRecord {
            source,
            options,
            code: exit.code,
            stderr: exit.stderr_tail,
        });
        exit.cleanup_error
    }

    fn run_unmount_helper(&self, mount_point: &Path) -> Result<()> {
        let command = HelperCommand::unmount(&self.helpers.unmount_helper, mount_point);
        tracing::debug!(command = %command, "running unmount helper");
        let output = command.to_command().output().map_err(|e| MountError::Io {
            path: self.helpers.unmount_helper.clone(),
            source: e,
        })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Err(MountError::UmountFailed {
            mount_point: mount_point.to_path_buf(),
            code: exit_code(output.status),
            stderr,
        })
    }

    fn set_state(&self, to: MountState) {
        let from = MountState::from_u8(self.state.swap(to.as_u8(), Ordering::SeqCst));
        if from != to {
            tracing::debug!(%from, %to, "mount state transition");
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| MountError::LockPoisoned)
    }
}

/// Logs a temporary mount point that outlived its helper.
fn warn_cleanup(error: Option<(PathBuf, std::io::Error)>) {
    if let Some((path, e)) = error {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary mount point");
    }
}

impl Drop for MountManager {
    fn drop(&mut self) {
        if !self.is_mounted() {
            return;
        }
        if let Err(e) = self.umount() {
            tracing::warn!(error = %e, "failed to unmount while dropping mount manager");
        }
        let Ok(inner) = self.inner.get_mut() else {
            return;
        };
        if let Some(active) = inner.active.take() {
            active.worker.terminate();
            warn_cleanup(active.worker.wait().cleanup_error);
        }
    }
}
