//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for `gensync`.
//! It uses the `thiserror` library to create a single `Error` enum covering
//! every fatal failure mode of a generation run, with messages that name the
//! generator instance, provider, or path involved.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Graph construction errors (`AmbiguousExport`,
//!   `UnresolvedDependency`, `CyclicDependency`, `UnknownScope`,
//!   `DuplicateInstance`) abort a run before any generator builds.
//!   `OutputPathCollision`, `ReservedPath` and an output path blocked on disk
//!   abort before any file is written. `Cancelled` aborts without committing
//!   anything. Failed instances do not abort a run: it commits what
//!   independent instances produced, and `RunReport::ensure_success` turns the
//!   recorded failures into `BuildFailed` for callers that want an `Err`.
//!
//! - **`BuildFailure`**: One failed or skipped generator instance, carried by
//!   `Error::BuildFailed` so a single run can surface every independent
//!   failure at once.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Merge conflicts, orphaned files and unreconciled first-run files are not
//! errors: they are reported per path on the [`crate::report::RunReport`].

use std::fmt;

use thiserror::Error;

/// Main error type for gensync operations
#[derive(Error, Debug)]
pub enum Error {
    /// The `.gensync.yaml` configuration is invalid.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Two generator instances export the same exclusive provider into the
    /// same visibility scope.
    #[error("Ambiguous export of exclusive provider '{provider}' in scope of '{scope_owner}': exported by both '{first}' and '{second}'")]
    AmbiguousExport {
        provider: String,
        scope_owner: String,
        first: String,
        second: String,
    },

    /// An exclusive dependency could not be matched to a reachable exporter.
    #[error("Unresolved dependency: '{instance}' requires provider '{provider}' but no reachable generator exports it")]
    UnresolvedDependency { instance: String, provider: String },

    /// More than one exporter was reachable at the same scope level for an
    /// exclusive dependency.
    #[error("Ambiguous dependency: '{instance}' requires exclusive provider '{provider}' but it is exported by {}", candidates.join(", "))]
    AmbiguousDependency {
        instance: String,
        provider: String,
        candidates: Vec<String>,
    },

    /// The dependency edges between generator instances contain a cycle.
    #[error("Cyclic dependency between generators: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A generator exports into a scope that none of its ancestors opened.
    #[error("Unknown export scope '{scope}' for provider '{provider}' exported by '{instance}': no ancestor opens this scope")]
    UnknownScope {
        instance: String,
        provider: String,
        scope: String,
    },

    /// Two children of the same parent were mounted under the same name.
    #[error("Duplicate generator instance '{identity}'")]
    DuplicateInstance { identity: String },

    /// Two generator instances produced the same output path.
    #[error("Output path collision: '{path}' is produced by both '{first}' and '{second}'")]
    OutputPathCollision {
        path: String,
        first: String,
        second: String,
    },

    /// A generator produced the baseline snapshot file or one of its parent
    /// directories.
    #[error("Output path '{path}' produced by '{instance}' is reserved for the baseline snapshot at '{snapshot}'")]
    ReservedPath {
        path: String,
        instance: String,
        snapshot: String,
    },

    /// One or more generator instances failed to build; their dependents
    /// were skipped.
    #[error("{} generator(s) failed to build:\n{}", failures.len(), failures.iter().map(|f| format!("  - {}", f)).collect::<Vec<_>>().join("\n"))]
    BuildFailed { failures: Vec<BuildFailure> },

    /// A dependency value could not be viewed as the requested Rust type.
    #[error("Provider type mismatch: '{instance}' read provider '{provider}' as an incompatible type")]
    ProviderMismatch { instance: String, provider: String },

    /// A generator declared an export but never published a value for it.
    #[error("Missing export: '{instance}' declared provider '{provider}' but did not export a value")]
    MissingExport { instance: String, provider: String },

    /// The run was cancelled cooperatively; nothing was committed.
    #[error("Run cancelled: no changes were committed")]
    Cancelled,

    /// The baseline snapshot could not be read or failed validation.
    #[error("Snapshot corrupt at {path}: {message}")]
    SnapshotCorrupt { path: String, message: String },

    /// An error occurred while merging file content.
    #[error("Merge operation error: {operation} - {message}")]
    Merge { operation: String, message: String },

    /// An error occurred with an in-memory or on-disk filesystem operation.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An output path is not a valid relative path inside the managed root.
    #[error("Path operation error: {message}")]
    Path { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// The worker pool for a run could not be started.
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// An error occurred during serialization.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a generator's build function.
///
/// Generators are authored outside this crate, so the error is boxed to let
/// them propagate any error type with `?`.
pub type BuildError = Box<dyn std::error::Error + Send + Sync>;

/// Why a generator instance did not produce output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The instance's build function returned an error.
    Failed { message: String },
    /// The instance was never started because a dependency failed.
    Skipped { upstream: String },
}

/// A single failed or skipped generator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    /// Identity of the instance (its path in the instantiation tree).
    pub instance: String,
    /// Dependency chain that led here. For a failed instance: its ancestors
    /// in the instantiation tree, root first. For a skipped instance: the
    /// dependency path from this instance to the failed upstream instance.
    pub chain: Vec<String>,
    pub kind: FailureKind,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Failed { message } => write!(f, "{}: {}", self.instance, message)?,
            FailureKind::Skipped { upstream } => write!(
                f,
                "{}: skipped due to upstream failure in '{}'",
                self.instance, upstream
            )?,
        }
        if !self.chain.is_empty() {
            write!(f, " (via {})", self.chain.join(" -> "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config_with_hint() {
        let error = Error::Config {
            message: "Invalid glob".to_string(),
            hint: Some("Escape '[' characters".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("hint:"));
        assert!(display.contains("Escape '['"));
    }

    #[test]
    fn test_error_display_cycle() {
        let error = Error::CyclicDependency {
            cycle: vec!["root/a".to_string(), "root/b".to_string(), "root/a".to_string()],
        };
        let display = format!("{}", error);
        assert!(display.contains("Cyclic dependency"));
        assert!(display.contains("root/a -> root/b -> root/a"));
    }

    #[test]
    fn test_error_display_ambiguous_export() {
        let error = Error::AmbiguousExport {
            provider: "node".to_string(),
            scope_owner: "root".to_string(),
            first: "root/a".to_string(),
            second: "root/b".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Ambiguous export"));
        assert!(display.contains("'node'"));
        assert!(display.contains("root/a"));
        assert!(display.contains("root/b"));
    }

    #[test]
    fn test_error_display_unresolved() {
        let error = Error::UnresolvedDependency {
            instance: "root/server".to_string(),
            provider: "config".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Unresolved dependency"));
        assert!(display.contains("root/server"));
        assert!(display.contains("config"));
    }

    #[test]
    fn test_error_display_build_failed_lists_every_failure() {
        let error = Error::BuildFailed {
            failures: vec![
                BuildFailure {
                    instance: "root/a".to_string(),
                    chain: vec![],
                    kind: FailureKind::Failed {
                        message: "template missing".to_string(),
                    },
                },
                BuildFailure {
                    instance: "root/b".to_string(),
                    chain: vec!["root/b".to_string(), "root/a".to_string()],
                    kind: FailureKind::Skipped {
                        upstream: "root/a".to_string(),
                    },
                },
            ],
        };
        let display = format!("{}", error);
        assert!(display.contains("2 generator(s) failed"));
        assert!(display.contains("root/a: template missing"));
        assert!(display.contains("skipped due to upstream failure in 'root/a'"));
        assert!(display.contains("via root/b -> root/a"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }

    #[test]
    fn test_error_output_collision() {
        let error = Error::OutputPathCollision {
            path: "src/main.rs".to_string(),
            first: "root/a".to_string(),
            second: "root/b".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Output path collision"));
        assert!(display.contains("src/main.rs"));
    }
}
