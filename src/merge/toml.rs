//! TOML codec for the structured merge
//!
//! TOML tables are read into a `serde_json::Value` tree. A TOML document is
//! always a table at the top level, so rendering anything else (including a
//! tree carrying a deleted-on-one-side conflict at the root) is an error and
//! the caller falls back to the line merge.

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Parse a TOML document.
pub fn parse(content: &str) -> Result<JsonValue> {
    toml::from_str(content).map_err(|err| Error::Merge {
        operation: "toml parse".to_string(),
        message: err.to_string(),
    })
}

/// Render a value as a TOML document.
pub fn render(value: &JsonValue) -> Result<String> {
    if !value.is_object() {
        return Err(Error::Merge {
            operation: "toml render".to_string(),
            message: "top-level TOML value must be a table".to_string(),
        });
    }
    toml::to_string_pretty(value).map_err(|err| Error::Merge {
        operation: "toml render".to_string(),
        message: err.to_string(),
    })
}
