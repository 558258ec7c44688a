//! `mountkit probe` — Report whether paths are active mounts.

use std::path::PathBuf;

use clap::Args;
use mountkit_core::probe::is_active_mount;
use serde::Serialize;

/// Arguments for the `probe` command.
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Paths to check.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ProbeResult<'a> {
    path: &'a PathBuf,
    mounted: bool,
}

/// Executes the `probe` command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(args: &ProbeArgs) -> anyhow::Result<()> {
    let results: Vec<_> = args
        .paths
        .iter()
        .map(|path| ProbeResult {
            path,
            mounted: is_active_mount(path),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    for r in &results {
        let label = if r.mounted { "mounted" } else { "not mounted" };
        println!("{:<12} {}", label, r.path.display());
    }
    Ok(())
}
