//! Path manipulation utilities for gensync
//!
//! Output paths are always stored as normalized, `/`-separated strings
//! relative to the managed root. Normalization rejects anything that could
//! escape the root, so the reconciler never touches a file outside the
//! declared output tree.

use crate::error::{Error, Result};
use glob::Pattern;

/// Normalize a generator-supplied output path.
///
/// Collapses `.` and empty segments and converts `\` separators. Absolute
/// paths, drive prefixes and `..` segments are rejected.
pub fn normalize_output_path(path: &str) -> Result<String> {
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(Error::Path {
            message: format!("Output path must be relative: '{}'", path),
        });
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::Path {
                    message: format!("Output path escapes the managed root: '{}'", path),
                })
            }
            s if s.contains(':') => {
                return Err(Error::Path {
                    message: format!("Output path contains a drive or stream prefix: '{}'", path),
                })
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(Error::Path {
            message: format!("Output path is empty: '{}'", path),
        });
    }

    Ok(segments.join("/"))
}

/// Match a path against a glob pattern
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    Ok(pattern.matches(path))
}

/// File extension of a normalized path, lowercased.
pub fn extension(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
