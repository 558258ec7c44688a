//! Background supervision of a foreground mount helper.
//!
//! The helper's lifetime is the mount's lifetime, so the worker thread
//! blocks on it until it exits. It then records the exit code, removes a
//! manager-owned mount point, clears the shared mounted flag, and sends one
//! [`WorkerExit`] message. The worker never touches manager state beyond
//! that flag.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use mountkit_common::constants::{STDERR_TAIL_LINES, WORKER_THREAD_NAME};
use mountkit_common::error::{MountError, Result};
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;

use crate::command::HelperCommand;
use crate::provision::MountPoint;
use crate::resolver::display_name;

/// Exit code recorded when the worker vanished without reporting.
const LOST_WORKER_CODE: i32 = -1;

/// Completion message sent once per helper process.
#[derive(Debug)]
pub struct WorkerExit {
    /// Helper exit code; `-signo` if it was killed by a signal.
    pub code: i32,
    /// Last lines the helper wrote to stderr.
    pub stderr_tail: Vec<String>,
    /// Failure removing a manager-owned mount point, if any.
    pub cleanup_error: Option<(PathBuf, std::io::Error)>,
}

impl WorkerExit {
    /// Returns `true` if the helper exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }
}

/// Handle to a running helper and its supervising thread.
#[derive(Debug)]
pub struct MountWorker {
    pid: u32,
    mounted: Arc<AtomicBool>,
    completion: Receiver<WorkerExit>,
    thread: Option<JoinHandle<()>>,
}

impl MountWorker {
    /// Spawns the helper and hands it, with its mount point, to a new
    /// worker thread.
    ///
    /// `mounted` is set before this returns and cleared by the worker once
    /// cleanup is done.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Io`] if the helper or the thread cannot be
    /// spawned. An owned mount point is removed on that path.
    pub fn launch(
        command: &HelperCommand,
        mount_point: MountPoint,
        mounted: Arc<AtomicBool>,
    ) -> Result<Self> {
        let child = command.to_command().spawn().map_err(|e| MountError::Io {
            path: command.program().to_path_buf(),
            source: e,
        })?;
        let pid = child.id();
        let helper = display_name(command.program());
        let (tx, rx) = mpsc::channel();

        mounted.store(true, Ordering::SeqCst);
        let flag = Arc::clone(&mounted);
        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || supervise(child, mount_point, &helper, &flag, &tx));

        let thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                mounted.store(false, Ordering::SeqCst);
                kill_and_reap(pid);
                return Err(MountError::Io {
                    path: PathBuf::from(WORKER_THREAD_NAME),
                    source: e,
                });
            }
        };

        tracing::debug!(pid, "mount worker started");
        Ok(Self {
            pid,
            mounted,
            completion: rx,
            thread: Some(thread),
        })
    }

    /// Process id of the helper.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns `true` until the worker has finished its cleanup.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Waits up to `timeout` for the helper to exit.
    ///
    /// Returns the completion message once, after which the worker thread
    /// has been joined.
    pub fn poll(&mut self, timeout: Duration) -> Option<WorkerExit> {
        match self.completion.recv_timeout(timeout) {
            Ok(exit) => Some(self.finish(exit)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(self.lost()),
        }
    }

    /// Non-blocking variant of [`MountWorker::poll`].
    pub fn try_poll(&mut self) -> Option<WorkerExit> {
        match self.completion.try_recv() {
            Ok(exit) => Some(self.finish(exit)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.lost()),
        }
    }

    /// Blocks until the helper exits and cleanup completes.
    pub fn wait(mut self) -> WorkerExit {
        match self.completion.recv() {
            Ok(exit) => self.finish(exit),
            Err(_) => self.lost(),
        }
    }

    /// Asks the helper and everything in its process group to terminate.
    pub fn terminate(&self) {
        signal_group(self.pid, Signal::SIGTERM);
    }

    fn finish(&mut self, exit: WorkerExit) -> WorkerExit {
        self.join();
        exit
    }

    fn lost(&mut self) -> WorkerExit {
        self.join();
        self.mounted.store(false, Ordering::SeqCst);
        tracing::error!(pid = self.pid, "mount worker ended without reporting");
        WorkerExit {
            code: LOST_WORKER_CODE,
            stderr_tail: Vec::new(),
            cleanup_error: None,
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!(pid = self.pid, "mount worker panicked");
            }
        }
    }
}

fn supervise(
    mut child: Child,
    mount_point: MountPoint,
    helper: &str,
    mounted: &AtomicBool,
    tx: &Sender<WorkerExit>,
) {
    let pid = child.id();
    let stderr_tail = child
        .stderr
        .take()
        .map(|stderr| drain_stderr(stderr, helper))
        .unwrap_or_default();

    let code = match child.wait() {
        Ok(status) => exit_code(status),
        Err(e) => {
            tracing::warn!(helper, pid, error = %e, "failed to wait for mount helper");
            LOST_WORKER_CODE
        }
    };
    tracing::debug!(helper, pid, code, "mount helper exited");

    let path = mount_point.path().to_path_buf();
    let owned = mount_point.is_owned();
    let cleanup_error = mount_point.release().err().map(|e| (path.clone(), e));
    if owned && cleanup_error.is_none() {
        tracing::debug!(mount_point = %path.display(), "removed temporary mount point");
    }

    // The message must be queued before the flag drops, so a caller that
    // sees `is_mounted() == false` can always reap.
    let _ = tx.send(WorkerExit {
        code,
        stderr_tail,
        cleanup_error,
    });
    mounted.store(false, Ordering::SeqCst);
}

/// Reads helper stderr to EOF, logging every line and keeping the tail.
fn drain_stderr(stderr: ChildStderr, helper: &str) -> Vec<String> {
    let mut reader = BufReader::new(stderr);
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                tracing::warn!(helper, line = %line, "mount helper stderr");
                if tail.len() == STDERR_TAIL_LINES {
                    let _ = tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                tracing::debug!(helper, error = %e, "stopped reading helper stderr");
                break;
            }
        }
    }
    tail.into()
}

/// Maps an exit status to a code, reporting signals as `-signo`.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| status.signal().map_or(LOST_WORKER_CODE, |sig| -sig))
}

/// The helper leads its own process group, so its pid is the group id.
fn signal_group(pid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), signal) {
        tracing::debug!(pid, error = %e, "failed to signal mount helper group");
    }
}

/// Terminates a helper nobody will supervise and collects its exit status.
fn kill_and_reap(pid: u32) {
    signal_group(pid, Signal::SIGTERM);
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = waitpid(Pid::from_raw(raw), None) {
        tracing::debug!(pid, error = %e, "failed to reap mount helper");
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::CommandExt;
    use std::path::Path;
    use std::time::Instant;

    use super::*;
    use crate::provision::Provisioner;

    fn sh(script: &str) -> HelperCommand {
        // Renders as `sh -f -c <script>`; `-f` only turns off globbing.
        HelperCommand::mount(
            Path::new("/bin/sh"),
            &[],
            Path::new("-c"),
            Path::new(script),
        )
    }

    #[test]
    fn exit_code_maps_signals_to_negative() {
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_code(status), -9);
        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(exit_code(status), 3);
    }

    #[test]
    fn worker_reports_exit_and_removes_owned_mount_point() {
        let flag = Arc::new(AtomicBool::new(false));
        let mp = Provisioner::default().provision(None).expect("provision");
        let path = mp.path().to_path_buf();
        let cmd = sh("echo broken archive >&2; exit 4");

        let worker = MountWorker::launch(&cmd, mp, Arc::clone(&flag)).expect("launch");
        let exit = worker.wait();

        assert_eq!(exit.code, 4);
        assert!(!exit.success());
        assert_eq!(exit.stderr_tail, vec!["broken archive".to_string()]);
        assert!(exit.cleanup_error.is_none());
        assert!(!path.exists());
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn borrowed_mount_point_survives_worker_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mp = Provisioner::default()
            .provision(Some(dir.path()))
            .expect("provision");
        let worker =
            MountWorker::launch(&sh("exit 0"), mp, Arc::new(AtomicBool::new(false)))
                .expect("launch");
        let exit = worker.wait();
        assert!(exit.success());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn terminate_reports_signal() {
        let flag = Arc::new(AtomicBool::new(false));
        let mp = Provisioner::default().provision(None).expect("provision");
        let mut worker =
            MountWorker::launch(&sh("exec sleep 30"), mp, Arc::clone(&flag)).expect("launch");
        assert!(worker.is_running());
        assert!(worker.poll(Duration::from_millis(50)).is_none());

        worker.terminate();
        let exit = worker.wait();
        assert_eq!(exit.code, -15);
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn terminate_reaches_helper_children() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("child.pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let mp = Provisioner::default().provision(None).expect("provision");
        let worker = MountWorker::launch(&sh(&script), mp, Arc::new(AtomicBool::new(false)))
            .expect("launch");
        let deadline = Instant::now() + Duration::from_secs(5);
        while !std::fs::read_to_string(&pid_file).is_ok_and(|s| !s.trim().is_empty()) {
            assert!(Instant::now() < deadline, "helper never started its child");
            std::thread::sleep(Duration::from_millis(10));
        }
        let child: u32 = std::fs::read_to_string(&pid_file)
            .expect("pid")
            .trim()
            .parse()
            .expect("numeric pid");

        let started = Instant::now();
        worker.terminate();
        let exit = worker.wait();

        // A surviving child would hold stderr open for the full 30s.
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(exit.code, -15);
        let deadline = Instant::now() + Duration::from_secs(5);
        while is_live(child) {
            assert!(Instant::now() < deadline, "helper child {child} survived");
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Alive and not a zombie.
    fn is_live(pid: u32) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                stat.rsplit_once(')')
                    .and_then(|(_, rest)| rest.split_whitespace().next().map(str::to_owned))
            })
            .is_some_and(|state| state != "Z" && state != "X")
    }

    #[test]
    fn kill_and_reap_leaves_no_zombie() {
        let child = std::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .expect("spawn");
        let pid = child.id();
        drop(child);

        kill_and_reap(pid);

        let raw = i32::try_from(pid).expect("pid fits");
        let err = waitpid(Pid::from_raw(raw), Some(nix::sys::wait::WaitPidFlag::WNOHANG))
            .unwrap_err();
        assert_eq!(err, nix::errno::Errno::ECHILD);
    }

    #[test]
    fn flag_clears_only_after_exit_is_queued() {
        let flag = Arc::new(AtomicBool::new(false));
        let mp = Provisioner::default().provision(None).expect("provision");
        let mut worker =
            MountWorker::launch(&sh("exit 6"), mp, Arc::clone(&flag)).expect("launch");
        while flag.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        let exit = worker.try_poll().expect("exit queued before flag cleared");
        assert_eq!(exit.code, 6);
    }

    #[test]
    fn stderr_tail_is_bounded() {
        let mp = Provisioner::default().provision(None).expect("provision");
        let script = "i=0; while [ $i -lt 40 ]; do echo line$i >&2; i=$((i+1)); done; exit 1";
        let worker = MountWorker::launch(&sh(script), mp, Arc::new(AtomicBool::new(false)))
            .expect("launch");
        let exit = worker.wait();
        assert_eq!(exit.stderr_tail.len(), STDERR_TAIL_LINES);
        assert_eq!(exit.stderr_tail.last().map(String::as_str), Some("line39"));
    }

    #[test]
    fn missing_program_is_io_error_and_cleans_up() {
        let mp = Provisioner::default().provision(None).expect("provision");
        let path = mp.path().to_path_buf();
        let cmd = HelperCommand::mount(
            Path::new("/nonexistent/helper"),
            &[],
            Path::new("/src"),
            &path,
        );
        let flag = Arc::new(AtomicBool::new(false));
        let err = MountWorker::launch(&cmd, mp, Arc::clone(&flag)).unwrap_err();
        assert!(matches!(err, MountError::Io { .. }));
        assert!(!path.exists());
        assert!(!flag.load(Ordering::SeqCst));
    }
}
