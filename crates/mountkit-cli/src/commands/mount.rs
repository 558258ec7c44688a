//! `mountkit mount` — Mount a source and hold it until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use mountkit_common::config::ManagerConfig;
use mountkit_common::constants::DEFAULT_HELPER;
use mountkit_common::error::MountError;
use mountkit_core::{MountManager, MountRequest};

use crate::output;

const WAIT_TICK_MS: u64 = 250;

/// Arguments for the `mount` command.
#[derive(Args, Debug)]
pub struct MountArgs {
    /// Archive or image to mount.
    pub source: PathBuf,

    /// Helper option; repeat or comma-separate (e.g. `-o ro,allow_other`).
    #[arg(short = 'o', long = "option", value_delimiter = ',')]
    pub options: Vec<String>,

    /// Empty directory to mount on instead of a temporary one.
    #[arg(short, long)]
    pub mount_point: Option<PathBuf>,

    /// Foreground FUSE helper to run.
    #[arg(long, default_value = DEFAULT_HELPER, env = "MOUNTKIT_HELPER")]
    pub helper: String,

    /// Give up if the mount is not active after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Interval between readiness checks, in milliseconds.
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Print the mount status as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Unmount right after listing instead of waiting for Ctrl+C.
    #[arg(long)]
    pub once: bool,
}

/// Executes the `mount` command.
///
/// # Errors
///
/// Returns an error if the helper cannot be resolved, the mount fails,
/// or the final unmount fails.
pub fn execute(args: MountArgs, mut config: ManagerConfig) -> anyhow::Result<()> {
    if let Some(timeout) = args.timeout_ms {
        config.mount_timeout_ms = Some(timeout);
    }
    if let Some(poll) = args.poll_ms {
        config.poll_interval_ms = poll;
    }

    let manager = MountManager::with_config(&args.helper, config)?;
    let mut request = MountRequest::new(&args.source).options(args.options.iter().cloned());
    if let Some(mount_point) = &args.mount_point {
        request = request.mount_point(mount_point);
    }

    let _ = manager.mount(request)?;
    let status = manager
        .status()?
        .ok_or_else(|| anyhow::anyhow!("helper exited right after mounting"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        output::print_status(&status);
        output::print_entries(&status.mount_point)?;
    }

    let interrupted = if args.once {
        true
    } else {
        wait_for_shutdown(&manager)?
    };

    match manager.umount() {
        Ok(()) => {
            eprintln!("  Unmounted {}", status.mount_point.display());
            Ok(())
        }
        Err(MountError::NotMounted { .. }) if !interrupted => {
            eprintln!("  Mount was released outside mountkit.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Blocks until Ctrl+C or until the helper exits on its own.
///
/// Returns `true` if the user interrupted.
fn wait_for_shutdown(manager: &MountManager) -> anyhow::Result<bool> {
    eprintln!();
    eprintln!("  Press Ctrl+C to unmount...");

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    while running.load(Ordering::SeqCst) && manager.is_mounted() {
        std::thread::sleep(Duration::from_millis(WAIT_TICK_MS));
    }
    Ok(!running.load(Ordering::SeqCst))
}
