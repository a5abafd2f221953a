//! # gensync
//!
//! This library orchestrates code generators that share a project tree with
//! the humans editing it. Generators declare what they need and what they
//! offer, are built in dependency order on a worker pool, and their output is
//! reconciled with the files on disk through a three-way merge against the
//! previous run's output, so that hand edits survive regeneration.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use gensync::{BuildContext, BuildError, Definition, Generator, OutputFile, RunOptions};
//!
//! struct Readme;
//!
//! impl Generator for Readme {
//!     fn define(&self, _def: &mut Definition) {}
//!
//!     fn build(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
//!         ctx.add_file(OutputFile::text("README.md", "# demo\n"))
//!     }
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let options = RunOptions::new(dir.path());
//! let report = gensync::execute_run("app", Arc::new(Readme), &options).unwrap();
//! assert_eq!(report.summary(), "1 new");
//! ```
//!
//! ## Core Concepts
//!
//! - **Providers (`provider`)**: Typed keys through which generators exchange
//!   values. Exclusive providers have one visible exporter per scope;
//!   read-only providers collect every reachable exporter.
//! - **Generators (`generator`)**: The definition boundary. A generator
//!   declares dependencies, exports, scopes and children, then builds exports
//!   and output files from its resolved dependencies.
//! - **Phases (`phases`)**: The pipeline of a run, from instantiating the
//!   generator tree to committing reconciled files.
//! - **Merging (`merge`)**: Line-based diff3 merging and key-level merging
//!   for JSON, YAML and TOML documents.
//! - **Snapshots (`snapshot`)**: The baseline store holding what each path
//!   was generated as on the last committed run.
//! - **Configuration (`config`)**: The `.gensync.yaml` document.
//!
//! ## Execution Flow
//!
//! The main entry point is [`phases::orchestrator::execute_run`]:
//!
//! 1.  **Discovery**: Instantiate the generator tree and resolve dependencies.
//! 2.  **Ordering**: Reject cycles and compute a stable build order.
//! 3.  **Execution**: Build instances level by level in parallel.
//! 4.  **Reconciliation**: Decide every output path and stage the writes.
//! 5.  **Writing**: Commit the staged writes and save the new baseline.

pub mod cancel;
pub mod config;
pub mod defaults;
pub mod error;
pub mod filesystem;
pub mod generator;
pub mod merge;
pub mod path;
pub mod phases;
pub mod provider;
pub mod report;
pub mod snapshot;

#[cfg(test)]
mod path_proptest;

pub use cancel::CancellationToken;
pub use error::{BuildError, Error, Result};
pub use generator::{
    BuildContext, Content, Definition, Dependency, Export, FileOptions, Generator, OutputFile,
};
pub use merge::{Formatter, MergeStrategy};
pub use phases::orchestrator::{execute_run, RunOptions};
pub use provider::{ExportScope, ProviderMode, ProviderType};
pub use report::{FileStatus, Issue, Outcome, RunReport};
