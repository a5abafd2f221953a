//! # Configuration Schema and Parsing
//!
//! This module defines the data structures that represent the `.gensync.yaml`
//! configuration file, as well as the logic for parsing and validating it.
//! Every field is optional; an empty or missing file yields the defaults.
//!
//! ```yaml
//! output_root: .
//! snapshot_path: .gensync/snapshot.json
//! workers:
//!   max: 16
//!   min: 10
//! conflict_style: diff3
//! strategies:
//!   - pattern: "**/*.jsonc"
//!     strategy: text
//! resolutions:
//!   - path: README.md
//!     action: keep-current
//! ```
//!
//! ## Key Components
//!
//! - **`Config`**: The whole document.
//!
//! - **`StrategyOverride`**: Replaces the merge strategy of every output
//!   path matching a glob. The first matching override wins; paths without
//!   one use the strategy their generator declared, with `auto` resolved by
//!   file extension.
//!
//! - **`Resolution`**: An operator decision for a file that differs from
//!   the generated content on a run without a baseline.
//!
//! ## Parsing
//!
//! `parse` deserializes the YAML and then validates it: glob patterns must
//! compile, and the snapshot path must stay inside the managed root.

use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::defaults::{default_workers, CONFIG_FILE, MIN_WORKERS, SNAPSHOT_PATH};
use crate::error::{Error, Result};
use crate::merge::{ConflictStyle, MergeStrategy};
use crate::path::{glob_match, normalize_output_path};

/// Worker pool bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Upper bound; defaults to twice the available parallelism.
    pub max: Option<usize>,
    /// Floor applied after `max`.
    pub min: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max: None,
            min: MIN_WORKERS,
        }
    }
}

impl WorkerConfig {
    /// Pool size actually used for a run.
    pub fn effective(&self) -> usize {
        self.max.unwrap_or_else(default_workers).max(self.min).max(1)
    }
}

/// Merge strategy override for paths matching a glob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOverride {
    pub pattern: String,
    pub strategy: MergeStrategy,
}

/// What to do with an unreconciled first-run file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionAction {
    /// Overwrite the file with the generated content.
    AcceptGenerated,
    /// Keep the file and adopt the generated content as its baseline.
    KeepCurrent,
}

/// Operator decision for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub path: String,
    pub action: ResolutionAction,
}

/// The `.gensync.yaml` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Managed project root. Relative paths are resolved against the
    /// directory holding the configuration file.
    pub output_root: PathBuf,
    /// Snapshot file, relative to `output_root`.
    pub snapshot_path: String,
    pub workers: WorkerConfig,
    pub conflict_style: ConflictStyle,
    pub strategies: Vec<StrategyOverride>,
    pub resolutions: Vec<Resolution>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            snapshot_path: SNAPSHOT_PATH.to_string(),
            workers: WorkerConfig::default(),
            conflict_style: ConflictStyle::default(),
            strategies: Vec::new(),
            resolutions: Vec::new(),
        }
    }
}

impl Config {
    /// Check patterns and paths; `parse` calls this.
    pub fn validate(&self) -> Result<()> {
        for over in &self.strategies {
            Pattern::new(&over.pattern).map_err(|e| Error::Config {
                message: format!("Invalid strategy pattern '{}': {}", over.pattern, e),
                hint: Some("Patterns use glob syntax, e.g. \"**/*.json\"".to_string()),
            })?;
        }

        normalize_output_path(&self.snapshot_path).map_err(|e| Error::Config {
            message: format!("Invalid snapshot_path '{}': {}", self.snapshot_path, e),
            hint: Some("Use a path relative to output_root, e.g. \".gensync/snapshot.json\"".to_string()),
        })?;

        for resolution in &self.resolutions {
            normalize_output_path(&resolution.path).map_err(|e| Error::Config {
                message: format!("Invalid resolution path '{}': {}", resolution.path, e),
                hint: Some("Resolutions name output paths relative to output_root".to_string()),
            })?;
        }

        if self.workers.max == Some(0) {
            return Err(Error::Config {
                message: "workers.max must be at least 1".to_string(),
                hint: None,
            });
        }
        Ok(())
    }

    /// Strategy for `path`: the first matching override, else `declared`
    /// with `auto` resolved by extension.
    pub fn strategy_for(&self, path: &str, declared: MergeStrategy) -> MergeStrategy {
        self.strategies
            .iter()
            .find(|over| glob_match(&over.pattern, path).unwrap_or(false))
            .map(|over| over.strategy)
            .unwrap_or(declared)
            .resolve(path)
    }

    /// Operator decision recorded for `path`, if any.
    pub fn resolution_for(&self, path: &str) -> Option<ResolutionAction> {
        self.resolutions
            .iter()
            .find(|r| normalize_output_path(&r.path).ok().as_deref() == Some(path))
            .map(|r| r.action)
    }

    /// Absolute-or-relative managed root, resolved against `base`.
    pub fn resolve_root(&self, base: &Path) -> PathBuf {
        if self.output_root.is_absolute() {
            self.output_root.clone()
        } else {
            base.join(&self.output_root)
        }
    }

    /// Snapshot file location under `root`.
    pub fn snapshot_file(&self, root: &Path) -> PathBuf {
        root.join(&self.snapshot_path)
    }
}

/// Parses and validates a YAML string into a `Config`.
pub fn parse(yaml_content: &str) -> Result<Config> {
    if yaml_content.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(yaml_content)?;
    config.validate()?;
    Ok(config)
}

/// Parse a `Config` from a YAML file path
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Load `.gensync.yaml` from `dir`, or the defaults when it does not exist.
pub fn discover(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE);
    if path.is_file() {
        from_file(path)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.snapshot_path, ".gensync/snapshot.json");
        assert_eq!(config.workers.min, 10);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
output_root: generated
snapshot_path: state/baseline.json
workers:
  max: 4
  min: 2
conflict_style: diff3
strategies:
  - pattern: "**/*.jsonc"
    strategy: text
resolutions:
  - path: README.md
    action: keep-current
  - path: ./docs/guide.md
    action: accept-generated
"#;
        let config = parse(yaml).unwrap();
        assert_eq!(config.output_root, PathBuf::from("generated"));
        assert_eq!(config.workers.effective(), 4);
        assert_eq!(config.conflict_style, ConflictStyle::Diff3);
        assert_eq!(
            config.resolution_for("README.md"),
            Some(ResolutionAction::KeepCurrent)
        );
        assert_eq!(
            config.resolution_for("docs/guide.md"),
            Some(ResolutionAction::AcceptGenerated)
        );
        assert_eq!(config.resolution_for("other.md"), None);
    }

    #[test]
    fn test_worker_floor_applies() {
        let workers = WorkerConfig {
            max: Some(2),
            min: 10,
        };
        assert_eq!(workers.effective(), 10);
        assert!(WorkerConfig::default().effective() >= MIN_WORKERS);
    }

    #[test]
    fn test_strategy_overrides() {
        let config = parse(
            r#"
strategies:
  - pattern: "legacy/*.json"
    strategy: text
  - pattern: "*.conf"
    strategy: yaml
"#,
        )
        .unwrap();
        assert_eq!(
            config.strategy_for("legacy/app.json", MergeStrategy::Auto),
            MergeStrategy::Text
        );
        assert_eq!(
            config.strategy_for("app.json", MergeStrategy::Auto),
            MergeStrategy::Json
        );
        assert_eq!(
            config.strategy_for("server.conf", MergeStrategy::Auto),
            MergeStrategy::Yaml
        );
        assert_eq!(
            config.strategy_for("notes.json", MergeStrategy::Text),
            MergeStrategy::Text
        );
    }

    #[test]
    fn test_invalid_glob_has_hint() {
        let err = parse("strategies:\n  - pattern: \"[\"\n    strategy: text\n").unwrap_err();
        let display = err.to_string();
        assert!(display.contains("Invalid strategy pattern"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn test_escaping_snapshot_path_is_rejected() {
        assert!(parse("snapshot_path: ../outside.json\n").is_err());
        assert!(parse("snapshot_path: /tmp/snapshot.json\n").is_err());
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result = parse("strategies:\n  - pattern: \"*\"\n    strategy: xml\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_root_and_snapshot_file() {
        let config = Config::default();
        let root = config.resolve_root(Path::new("/project"));
        assert_eq!(root, PathBuf::from("/project/."));
        assert_eq!(
            config.snapshot_file(Path::new("/project")),
            PathBuf::from("/project/.gensync/snapshot.json")
        );
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(discover(temp_dir.path()).unwrap(), Config::default());

        std::fs::write(temp_dir.path().join(CONFIG_FILE), "conflict_style: diff3\n").unwrap();
        assert_eq!(
            discover(temp_dir.path()).unwrap().conflict_style,
            ConflictStyle::Diff3
        );
    }

    #[test]
    fn test_from_file_nonexistent() {
        assert!(from_file("nonexistent_file.yaml").is_err());
    }
}
