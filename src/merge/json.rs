//! JSON codec for the structured merge
//!
//! Documents are parsed into `serde_json::Value` with insertion order
//! preserved, so a re-rendered file keeps its keys where the user put them.
//! Rendering reuses the indentation found in a reference document when one
//! is available.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

const DEFAULT_INDENT: &str = "  ";

/// Parse a JSON document.
pub fn parse(content: &str) -> Result<JsonValue> {
    serde_json::from_str(content).map_err(|err| Error::Merge {
        operation: "json parse".to_string(),
        message: err.to_string(),
    })
}

/// Render a value as pretty JSON with a trailing newline.
///
/// `reference` is an existing document whose indentation is reused.
pub fn render(value: &JsonValue, reference: Option<&str>) -> Result<String> {
    let indent = reference
        .and_then(detect_indent)
        .unwrap_or_else(|| DEFAULT_INDENT.to_string());

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(|err| Error::Merge {
        operation: "json render".to_string(),
        message: err.to_string(),
    })?;

    let mut out = String::from_utf8(buf).map_err(|err| Error::Merge {
        operation: "json render".to_string(),
        message: err.to_string(),
    })?;
    out.push('\n');
    Ok(out)
}

/// Leading whitespace of the first indented line, if any.
pub fn detect_indent(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let trimmed = line.trim_start_matches([' ', '\t']);
        let width = line.len() - trimmed.len();
        if width > 0 && !trimmed.is_empty() {
            Some(line[..width].to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_preserves_key_order() {
        let value = parse(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_parse_error_is_merge_error() {
        let err = parse("{ not json").unwrap_err();
        assert!(matches!(err, Error::Merge { .. }));
    }

    #[test]
    fn test_render_default_indent() {
        let out = render(&json!({"a": 1}), None).unwrap();
        assert_eq!(out, "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_render_reuses_reference_indent() {
        let reference = "{\n    \"a\": 0\n}\n";
        let out = render(&json!({"a": 1}), Some(reference)).unwrap();
        assert_eq!(out, "{\n    \"a\": 1\n}\n");

        let tabbed = "{\n\t\"a\": 0\n}\n";
        let out = render(&json!({"a": 1}), Some(tabbed)).unwrap();
        assert_eq!(out, "{\n\t\"a\": 1\n}\n");
    }

    #[test]
    fn test_detect_indent_on_compact_document() {
        assert_eq!(detect_indent(r#"{"a":1}"#), None);
    }
}
