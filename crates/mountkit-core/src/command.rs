//! Helper command lines.

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use mountkit_common::constants::{FOREGROUND_FLAG, OPTION_FLAG, UNMOUNT_FLAG};

/// Argument vector for a foreground mount helper invocation.
///
/// Renders as `<helper> -f [-o <opt1,opt2,...>] <source> <mount_point>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl HelperCommand {
    /// Assembles the mount invocation. Empty options are skipped, and the
    /// `-o` flag is omitted when nothing remains.
    #[must_use]
    pub fn mount(helper: &Path, options: &[String], source: &Path, mount_point: &Path) -> Self {
        let mut args = vec![OsString::from(FOREGROUND_FLAG)];
        let joined = join_options(options);
        if !joined.is_empty() {
            args.push(OsString::from(OPTION_FLAG));
            args.push(OsString::from(joined));
        }
        args.push(source.as_os_str().to_owned());
        args.push(mount_point.as_os_str().to_owned());
        Self {
            program: helper.to_path_buf(),
            args,
        }
    }

    /// Assembles the unmount invocation `<unmount_helper> -u <mount_point>`.
    #[must_use]
    pub fn unmount(unmount_helper: &Path, mount_point: &Path) -> Self {
        Self {
            program: unmount_helper.to_path_buf(),
            args: vec![
                OsString::from(UNMOUNT_FLAG),
                mount_point.as_os_str().to_owned(),
            ],
        }
    }

    /// Returns the program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the arguments following the program.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Builds a [`Command`] with stdin and stdout detached and stderr piped.
    ///
    /// The child gets its own process group so a terminal Ctrl+C aimed at
    /// the caller does not tear the mount down behind the manager's back.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        let _ = cmd
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .process_group(0);
        cmd
    }
}

impl std::fmt::Display for HelperCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Flattens helper options into the single comma-joined `-o` value.
#[must_use]
pub fn join_options(options: &[String]) -> String {
    options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
