//! Three-way merge for generated files
//!
//! This module merges the on-disk ("current") version of a file with a newly
//! generated version, using the previously generated baseline as the common
//! ancestor. Each output file carries a [`MergeStrategy`] tag that selects
//! the algorithm.
//!
//! ## Supported Strategies
//!
//! - Text (text.rs) - diff3-style line merge with inline conflict markers
//! - JSON (json.rs), YAML (yaml.rs), TOML (toml.rs) - parsed into an ordered
//!   key tree and merged per key (structured.rs)
//!
//! A structured merge that cannot parse one of its inputs falls back to the
//! line merge, so a malformed file is never silently replaced.
//!
//! ## Common Types
//!
//! The `PathSegment` enum names a location inside a structured document so
//! that key-level conflicts can be reported as `servers[0].host` style paths.

pub mod json;
pub mod structured;
pub mod text;
pub mod toml;
pub mod yaml;

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Error, Result};
use crate::generator::Content;
use crate::path::extension;

use structured::StructuredFormat;

/// Marker line labels used in conflict regions.
pub const CURRENT_LABEL: &str = "current";
pub const BASELINE_LABEL: &str = "baseline";
pub const GENERATED_LABEL: &str = "generated";

/// Merge algorithm selected for an output file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Pick by file extension.
    #[default]
    Auto,
    Text,
    Json,
    Yaml,
    Toml,
}

impl MergeStrategy {
    /// Replace `Auto` with the strategy implied by the path's extension.
    pub fn resolve(self, path: &str) -> MergeStrategy {
        match self {
            MergeStrategy::Auto => match extension(path).as_deref() {
                Some("json") => MergeStrategy::Json,
                Some("yaml") | Some("yml") => MergeStrategy::Yaml,
                Some("toml") => MergeStrategy::Toml,
                _ => MergeStrategy::Text,
            },
            other => other,
        }
    }

    fn structured_format(self) -> Option<StructuredFormat> {
        match self {
            MergeStrategy::Json => Some(StructuredFormat::Json),
            MergeStrategy::Yaml => Some(StructuredFormat::Yaml),
            MergeStrategy::Toml => Some(StructuredFormat::Toml),
            MergeStrategy::Auto | MergeStrategy::Text => None,
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStrategy::Auto => "auto",
            MergeStrategy::Text => "text",
            MergeStrategy::Json => "json",
            MergeStrategy::Yaml => "yaml",
            MergeStrategy::Toml => "toml",
        };
        f.write_str(name)
    }
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(MergeStrategy::Auto),
            "text" => Ok(MergeStrategy::Text),
            "json" => Ok(MergeStrategy::Json),
            "yaml" | "yml" => Ok(MergeStrategy::Yaml),
            "toml" => Ok(MergeStrategy::Toml),
            other => Err(Error::Config {
                message: format!("Unknown merge strategy '{}'", other),
                hint: Some("Use one of: auto, text, json, yaml, toml".to_string()),
            }),
        }
    }
}

/// How line conflicts are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStyle {
    /// `current` and `generated` sections only.
    #[default]
    Merge,
    /// Also include the `baseline` section.
    Diff3,
}

/// Result of a three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged content; contains conflict markers when `conflicts` is not empty.
    pub content: String,
    /// Human-readable description of each conflicting region or key.
    pub conflicts: Vec<String>,
}

impl MergeOutcome {
    pub fn clean(content: String) -> Self {
        Self {
            content,
            conflicts: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Merge `current` and `generated` against their common `baseline`.
pub fn three_way(
    strategy: MergeStrategy,
    baseline: &str,
    current: &str,
    generated: &str,
    style: ConflictStyle,
) -> MergeOutcome {
    if let Some(format) = strategy.structured_format() {
        match structured::merge_documents(format, baseline, current, generated) {
            Ok(outcome) => return outcome,
            Err(e) => debug!("Structured {} merge unavailable, using line merge: {}", strategy, e),
        }
    }
    text::merge(baseline, current, generated, style)
}

/// Render generated content to the text that lands on disk.
pub fn render(strategy: MergeStrategy, content: &Content) -> Result<String> {
    match content {
        Content::Text(text) => Ok(text.clone()),
        Content::Structured(value) => match strategy.structured_format() {
            Some(format) => format.render(value, None),
            None => StructuredFormat::Json.render(value, None),
        },
    }
}

/// Post-merge rewriting hook, e.g. a syntax-aware formatter.
///
/// Receives the merged text of one file and returns the text to write.
pub trait Formatter: Send + Sync {
    fn format(&self, path: &str, content: &str) -> std::result::Result<String, BuildError>;
}

/// Represents a segment in a path expression for navigating nested structures
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing object/map members
    Key(String),
    /// A numeric index for accessing array/sequence elements
    Index(usize),
}

/// Format segments as a dotted path, quoting keys that need it.
///
/// # Examples
///
/// ```
/// use gensync::merge::{format_path, PathSegment};
///
/// let path = vec![
///     PathSegment::Key("servers".to_string()),
///     PathSegment::Index(0),
///     PathSegment::Key("special.key".to_string()),
/// ];
/// assert_eq!(format_path(&path), r#"servers[0]["special.key"]"#);
/// ```
pub fn format_path(segments: &[PathSegment]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }

    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                let plain = !key.is_empty()
                    && key
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
                if plain {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                } else {
                    out.push_str(&format!("[\"{}\"]", key.replace('"', "\\\"")));
                }
            }
            PathSegment::Index(idx) => out.push_str(&format!("[{}]", idx)),
        }
    }
    out
}
