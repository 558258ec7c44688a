//! CLI command definitions and dispatch.

pub mod check;
pub mod mount;
pub mod probe;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mountkit_common::config::ManagerConfig;

/// mountkit — mount archives and images through foreground FUSE helpers.
#[derive(Parser, Debug)]
#[command(name = "mountkit", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON file with manager settings.
    #[arg(long, global = true, env = "MOUNTKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mount a source, list it, and unmount on Ctrl+C.
    Mount(mount::MountArgs),
    /// Resolve the mount and unmount helpers.
    Check(check::CheckArgs),
    /// Report whether paths are active mounts.
    Probe(probe::ProbeArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Mount(args) => mount::execute(args, load_config(config)?),
        Command::Check(args) => check::execute(&args, load_config(config)?),
        Command::Probe(args) => probe::execute(&args),
    }
}

/// Loads the configuration file if one was given, else the defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ManagerConfig> {
    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            ManagerConfig::from_json_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))
        }
        None => Ok(ManagerConfig::default()),
    }
}
