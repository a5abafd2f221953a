//! Key-level three-way merge for structured documents
//!
//! JSON, YAML and TOML documents are parsed into one ordered value tree and
//! merged per key:
//!
//! - a key changed on one side takes that side's value
//! - a key changed identically on both sides takes that value once
//! - a key changed differently on both sides becomes a conflict object
//! - objects present on both sides are merged recursively
//!
//! Arrays and scalars are atomic. Keys keep the order of the current
//! document, with keys new in the generated document appended after.
//!
//! A conflicting key is replaced by an object that names the conflict and
//! holds both versions, so the result is still a valid document of the
//! same format and a human can resolve it in place:
//!
//! ```json
//! { "port": { "__conflict__": "...", "current": 8081, "generated": 9090 } }
//! ```
//!
//! Differences in whitespace, key quoting or comments never produce a
//! conflict by themselves. When the merged tree equals one of the inputs that
//! input's text is kept byte-for-byte; otherwise the tree is re-rendered.

use serde_json::{Map, Value as JsonValue};

use super::{
    format_path, json, toml, yaml, MergeOutcome, PathSegment, CURRENT_LABEL, GENERATED_LABEL,
};
use crate::error::Result;

/// Key under which a conflict object carries its description.
pub const CONFLICT_KEY: &str = "__conflict__";

/// Structured document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredFormat {
    Json,
    Yaml,
    Toml,
}

impl StructuredFormat {
    pub fn parse(self, content: &str) -> Result<JsonValue> {
        match self {
            StructuredFormat::Json => json::parse(content),
            StructuredFormat::Yaml => yaml::parse(content),
            StructuredFormat::Toml => toml::parse(content),
        }
    }

    /// Render `value`; `reference` lends its indentation where the format
    /// allows it.
    pub fn render(self, value: &JsonValue, reference: Option<&str>) -> Result<String> {
        match self {
            StructuredFormat::Json => json::render(value, reference),
            StructuredFormat::Yaml => yaml::render(value),
            StructuredFormat::Toml => toml::render(value),
        }
    }
}

/// A key changed differently on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyConflict {
    pub path: String,
    /// `None` when the current side deleted the key.
    pub current: Option<JsonValue>,
    /// `None` when the generated side deleted the key.
    pub generated: Option<JsonValue>,
}

impl KeyConflict {
    fn describe(&self) -> String {
        format!(
            "key '{}' changed on both sides ({}: {}, {}: {})",
            self.path,
            CURRENT_LABEL,
            show(self.current.as_ref()),
            GENERATED_LABEL,
            show(self.generated.as_ref())
        )
    }

    fn marker(&self) -> JsonValue {
        let mut object = Map::new();
        object.insert(
            CONFLICT_KEY.to_string(),
            JsonValue::String(format!(
                "'{}' was changed by both the user and the generator; keep one value",
                self.path
            )),
        );
        if let Some(value) = &self.current {
            object.insert(CURRENT_LABEL.to_string(), value.clone());
        }
        if let Some(value) = &self.generated {
            object.insert(GENERATED_LABEL.to_string(), value.clone());
        }
        JsonValue::Object(object)
    }
}

fn show(value: Option<&JsonValue>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "deleted".to_string(),
    }
}

/// Merge one key's values. `None` means the key is absent on that side;
/// a `None` result removes the key.
pub fn merge_values(
    base: Option<&JsonValue>,
    current: Option<&JsonValue>,
    generated: Option<&JsonValue>,
    path: &mut Vec<PathSegment>,
    conflicts: &mut Vec<KeyConflict>,
) -> Option<JsonValue> {
    if current == generated || base == generated {
        return current.cloned();
    }
    if base == current {
        return generated.cloned();
    }

    if let (Some(JsonValue::Object(ours)), Some(JsonValue::Object(theirs))) = (current, generated)
    {
        let empty = Map::new();
        let base_map = match base {
            Some(JsonValue::Object(map)) => map,
            _ => &empty,
        };

        let mut merged = Map::new();
        for (key, value) in ours {
            path.push(PathSegment::Key(key.clone()));
            let result = merge_values(
                base_map.get(key),
                Some(value),
                theirs.get(key),
                path,
                conflicts,
            );
            path.pop();
            if let Some(value) = result {
                merged.insert(key.clone(), value);
            }
        }
        for (key, value) in theirs.iter().filter(|(k, _)| !ours.contains_key(*k)) {
            path.push(PathSegment::Key(key.clone()));
            let result = merge_values(base_map.get(key), None, Some(value), path, conflicts);
            path.pop();
            if let Some(value) = result {
                merged.insert(key.clone(), value);
            }
        }
        return Some(JsonValue::Object(merged));
    }

    let conflict = KeyConflict {
        path: format_path(path),
        current: current.cloned(),
        generated: generated.cloned(),
    };
    let marker = conflict.marker();
    conflicts.push(conflict);
    Some(marker)
}

/// Three-way merge of whole documents.
///
/// Fails when any input does not parse or the merged tree cannot be
/// rendered back into `format`.
pub fn merge_documents(
    format: StructuredFormat,
    baseline: &str,
    current: &str,
    generated: &str,
) -> Result<MergeOutcome> {
    let base_value = format.parse(baseline)?;
    let current_value = format.parse(current)?;
    let generated_value = format.parse(generated)?;

    let mut conflicts = Vec::new();
    let merged = merge_values(
        Some(&base_value),
        Some(&current_value),
        Some(&generated_value),
        &mut Vec::new(),
        &mut conflicts,
    )
    .unwrap_or(JsonValue::Null);

    let content = if merged == current_value {
        current.to_string()
    } else if merged == generated_value {
        generated.to_string()
    } else {
        format.render(&merged, Some(current))?
    };

    Ok(MergeOutcome {
        content,
        conflicts: conflicts.iter().map(KeyConflict::describe).collect(),
    })
}
