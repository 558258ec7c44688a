//! Formatted output helpers for CLI commands.
//!
//! Prints the mount status block and a one-level listing of the mounted
//! tree, with human-readable sizes.

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use mountkit_common::types::MountStatus;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Formats a byte count into a human-readable string (e.g., "128 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Renders one listing line: name, then size or `<dir>`.
#[must_use]
pub fn format_entry(name: &str, is_dir: bool, len: u64) -> String {
    if is_dir {
        format!("{:<40} {:>10}", format!("{name}/"), "<dir>")
    } else {
        format!("{name:<40} {:>10}", format_bytes(len))
    }
}

/// Formats a UTC timestamp in local time (e.g., "2026-10-16 14:02:11").
#[must_use]
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Prints where the source was mounted and how.
pub fn print_status(status: &MountStatus) {
    eprintln!();
    eprintln!(
        "  {GREEN}{BOLD}Mounted{RESET} {} {DIM}(pid {}){RESET}",
        status.source.display(),
        status.helper_pid
    );
    eprintln!("    at      {}", status.mount_point.display());
    if let Some(at) = status.mounted_at {
        eprintln!("    since   {}", format_time(at));
    }
    if !status.options.is_empty() {
        eprintln!("    options {}", status.options.join(","));
    }
    if status.owned {
        eprintln!("    {DIM}temporary mount point, removed on unmount{RESET}");
    }
    eprintln!();
}

/// Lists the top level of the mounted tree on stdout, sorted by name.
///
/// # Errors
///
/// Returns an error if the mount point cannot be read.
pub fn print_entries(mount_point: &Path) -> anyhow::Result<()> {
    let mut entries = std::fs::read_dir(mount_point)
        .map_err(|e| anyhow::anyhow!("failed to list {}: {e}", mount_point.display()))?
        .filter_map(Result::ok)
        .collect::<Vec<_>>();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    if entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    for entry in &entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let (is_dir, len) = entry
            .metadata()
            .map_or((false, 0), |m| (m.is_dir(), m.len()));
        println!("{}", format_entry(&name, is_dir, len));
    }
    Ok(())
}
