//! `mountkit check` — Resolve the helpers without mounting anything.

use std::path::Path;

use clap::Args;
use mountkit_common::config::ManagerConfig;
use mountkit_common::constants::DEFAULT_HELPER;
use mountkit_core::resolver;

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Foreground FUSE helper to look up.
    #[arg(long, default_value = DEFAULT_HELPER, env = "MOUNTKIT_HELPER")]
    pub helper: String,
}

/// Executes the `check` command.
///
/// # Errors
///
/// Returns an error if either helper is missing from `PATH`.
pub fn execute(args: &CheckArgs, config: ManagerConfig) -> anyhow::Result<()> {
    let helpers = resolver::resolve_helpers(&args.helper, &config.unmount_helper)?;
    println!("{:<16} {}", "helper", helpers.helper.display());
    println!("{:<16} {}", "unmount helper", helpers.unmount_helper.display());
    let fuse = if Path::new("/dev/fuse").exists() {
        "present"
    } else {
        "missing"
    };
    println!("{:<16} {fuse}", "/dev/fuse");
    Ok(())
}
