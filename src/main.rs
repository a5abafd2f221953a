//! # gensync CLI
//!
//! This is the binary entry point for the `gensync` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging from `--log-level` and `RUST_LOG`.
//! - Mapping command results to exit codes: 0 when clean, 1 when conflicts
//!   or divergence were found, 2 on errors.
//!
//! Generators are Rust code linked against the library, so the binary only
//! exposes the parts of the pipeline that work on files alone: the merge
//! engine and the snapshot store.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    cli.init_logging();
    match cli.execute() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
