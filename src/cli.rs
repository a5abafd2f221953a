//! CLI argument parsing and command dispatch

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// gensync - Reconcile generated code with hand edits
#[derive(Parser, Debug)]
#[command(name = "gensync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Three-way merge a file against its baseline and a generated version
    MergeFile(commands::merge_file::MergeFileArgs),

    /// Inspect the baseline snapshot store
    Snapshot(commands::snapshot::SnapshotArgs),
}

impl Cli {
    /// Initialize `env_logger`; `RUST_LOG` takes precedence over `--log-level`.
    pub fn init_logging(&self) {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&self.log_level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        builder.format_timestamp(None);
        // Only fails if a logger is already installed.
        let _ = builder.try_init();
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<ExitCode> {
        match self.command {
            Commands::MergeFile(args) => commands::merge_file::execute(args),
            Commands::Snapshot(args) => commands::snapshot::execute(args),
        }
    }
}
