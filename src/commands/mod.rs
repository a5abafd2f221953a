//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `gensync`
//! command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args`, calls into the
//!   `gensync` library, and returns the process exit code.

pub mod merge_file;
pub mod snapshot;
