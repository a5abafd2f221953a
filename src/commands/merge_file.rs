//! # Merge-File Command Implementation
//!
//! This module implements the `merge-file` subcommand, which runs the
//! reconciler's merge engine on three files without a generator graph:
//!
//! ```text
//! gensync merge-file <CURRENT> <BASELINE> <GENERATED> [--strategy S] [--output FILE]
//! ```
//!
//! The strategy defaults to `auto`, resolved from the extension of
//! `<CURRENT>`. The merged text goes to `--output`, or to stdout when no
//! output is given. Conflicting regions are listed on stderr.
//!
//! ## Exit Codes
//!
//! - 0: merged cleanly
//! - 1: the result contains conflicts
//! - 2: an input could not be read or the output could not be written

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use log::info;

use gensync::filesystem::write_atomic;
use gensync::merge::{self, ConflictStyle, MergeStrategy};

/// Three-way merge a file against its baseline and a generated version
#[derive(Args, Debug)]
pub struct MergeFileArgs {
    /// The file as it is now, possibly hand-edited.
    pub current: PathBuf,

    /// The common ancestor: what was generated last time.
    pub baseline: PathBuf,

    /// The newly generated version.
    pub generated: PathBuf,

    /// Merge strategy (auto, text, json, yaml, toml).
    #[arg(short, long, value_name = "STRATEGY", default_value = "auto")]
    pub strategy: MergeStrategy,

    /// Write the result here instead of stdout. May be the current file.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Include the baseline section in conflict markers.
    #[arg(long)]
    pub diff3: bool,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
}

/// Execute the `merge-file` command.
pub fn execute(args: MergeFileArgs) -> Result<ExitCode> {
    let current = read(&args.current)?;
    let baseline = read(&args.baseline)?;
    let generated = read(&args.generated)?;

    let strategy = args.strategy.resolve(&args.current.to_string_lossy());
    let style = if args.diff3 {
        ConflictStyle::Diff3
    } else {
        ConflictStyle::Merge
    };
    info!("Merging {} with the {} strategy", args.current.display(), strategy);

    let outcome = merge::three_way(strategy, &baseline, &current, &generated, style);

    match &args.output {
        Some(path) => write_atomic(path, outcome.content.as_bytes())?,
        None => print!("{}", outcome.content),
    }

    if outcome.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        for region in &outcome.conflicts {
            eprintln!("conflict: {}", region);
        }
        Ok(ExitCode::from(1))
    }
}
