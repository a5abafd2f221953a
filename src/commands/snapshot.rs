//! # Snapshot Command Implementation
//!
//! This module implements the `snapshot` subcommand, which inspects the
//! baseline store of a managed project. Both subcommands are read-only.
//!
//! - `snapshot list` prints every recorded path with the instance that
//!   generated it and a short content hash.
//! - `snapshot verify` checks the store's integrity and compares each
//!   recorded path with the file on disk, listing the ones that were edited
//!   or deleted since the last run. It exits with 1 when any path diverges.
//!
//! The store is located through `.gensync.yaml` in `--root` when present.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};

use gensync::config;
use gensync::filesystem::read_optional;
use gensync::snapshot::{Snapshot, SnapshotStore};

/// Inspect the baseline snapshot store
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,

    /// Project directory containing `.gensync.yaml`.
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    pub root: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// List recorded paths
    List,
    /// Report files that diverge from the snapshot
    Verify,
}

/// Execute the `snapshot` command.
pub fn execute(args: SnapshotArgs) -> Result<ExitCode> {
    let config = config::discover(&args.root)?;
    let output_root = config.resolve_root(&args.root);
    let store = SnapshotStore::new(config.snapshot_file(&output_root));

    let snapshot = match store.load()? {
        Some(snapshot) => snapshot,
        None => {
            println!("No snapshot at {}", store.path().display());
            return Ok(ExitCode::SUCCESS);
        }
    };

    match args.command {
        SnapshotCommand::List => {
            list(&snapshot);
            Ok(ExitCode::SUCCESS)
        }
        SnapshotCommand::Verify => verify(&snapshot, &output_root),
    }
}

fn list(snapshot: &Snapshot) {
    for (path, entry) in &snapshot.entries {
        let short = entry.hash.get(..12).unwrap_or(&entry.hash);
        println!("{}  {}  {}", short, entry.generator, path);
    }
    println!("{} path(s)", snapshot.len());
}

fn verify(snapshot: &Snapshot, root: &Path) -> Result<ExitCode> {
    let mut diverged = 0;
    for (path, entry) in &snapshot.entries {
        match read_optional(root, path)? {
            Some(content) if entry.matches(&content) => {}
            Some(_) => {
                println!("modified  {}", path);
                diverged += 1;
            }
            None => {
                println!("missing   {}", path);
                diverged += 1;
            }
        }
    }

    if diverged == 0 {
        println!("All {} path(s) match the snapshot", snapshot.len());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} of {} path(s) diverge from the snapshot", diverged, snapshot.len());
        Ok(ExitCode::from(1))
    }
}
