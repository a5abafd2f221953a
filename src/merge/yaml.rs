//! YAML codec for the structured merge
//!
//! YAML documents are read into the same `serde_json::Value` tree the JSON
//! codec uses, which keeps the merge itself format-agnostic. Mappings with
//! non-string keys or tagged values do not fit that tree; parsing them fails
//! and the caller falls back to the line merge.
//!
//! Comments are not part of the tree, so a re-rendered YAML file loses them.
//! The merge avoids re-rendering whenever the result equals one of the inputs.

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Parse a YAML document.
pub fn parse(content: &str) -> Result<JsonValue> {
    serde_yaml::from_str(content).map_err(|err| Error::Merge {
        operation: "yaml parse".to_string(),
        message: err.to_string(),
    })
}

/// Render a value as a YAML document.
pub fn render(value: &JsonValue) -> Result<String> {
    serde_yaml::to_string(value).map_err(|err| Error::Merge {
        operation: "yaml render".to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_mapping() {
        let value = parse("server:\n  host: localhost\n  ports: [80, 443]\n").unwrap();
        assert_eq!(
            value,
            json!({"server": {"host": "localhost", "ports": [80, 443]}})
        );
    }

    #[test]
    fn test_parse_rejects_invalid_yaml() {
        assert!(parse("key: [unclosed").is_err());
    }

    #[test]
    fn test_render_mapping() {
        let out = render(&json!({"name": "demo", "tags": ["a"]})).unwrap();
        assert_eq!(out, "name: demo\ntags:\n- a\n");
    }
}
