//! Default values for gensync configuration.
//!
//! This module provides centralized default values used across the library
//! and the CLI, ensuring consistency and avoiding duplication.

/// Configuration file looked up in the managed root.
pub const CONFIG_FILE: &str = ".gensync.yaml";

/// Baseline snapshot location, relative to the managed root.
pub const SNAPSHOT_PATH: &str = ".gensync/snapshot.json";

/// Lower bound on the worker pool, so small machines still overlap file I/O.
pub const MIN_WORKERS: usize = 10;

/// Deepest instantiation tree accepted before assuming runaway recursion.
pub const MAX_INSTANCE_DEPTH: usize = 128;

/// Returns the default worker pool size: twice the available parallelism,
/// never below [`MIN_WORKERS`].
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * 2).max(MIN_WORKERS)
}
