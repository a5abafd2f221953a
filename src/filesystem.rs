//! Staging filesystem and disk helpers
//!
//! Reconciliation never touches the disk directly. Every decided write lands
//! in a [`MemoryFS`] staging buffer keyed by normalized output path, and is
//! committed only after every path has been evaluated. The disk helpers here
//! are the only functions that read or write files under the managed root.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// A staged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// File content as bytes
    pub content: Vec<u8>,
}

impl File {
    /// Create a new file with content
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    /// Create a new file from string content
    pub fn from_string(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }

    /// Get file size in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// In-memory filesystem used as the staging buffer for a run
///
/// Paths are normalized relative output paths. Iteration order is sorted by
/// path so commits and reports are deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryFS {
    files: BTreeMap<String, File>,
}

impl MemoryFS {
    /// Create a new empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a file
    pub fn add_file(&mut self, path: impl Into<String>, file: File) {
        self.files.insert(path.into(), file);
    }

    /// Add a file with string content
    pub fn add_file_string(&mut self, path: impl Into<String>, content: &str) {
        self.add_file(path, File::from_string(content));
    }

    /// Get a file by path
    pub fn get_file(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Check if a file exists
    pub fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// List all files
    pub fn list_files(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Get the number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if filesystem is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over all files as (path, file) pairs
    pub fn files(&self) -> impl Iterator<Item = (&String, &File)> {
        self.files.iter()
    }
}

/// Read `root/relative`, or `None` when nothing exists there.
///
/// A directory or other non-file entry at the path is an error: the run could
/// never write a file there, and finding out at commit time would be too late.
pub fn read_optional(root: &Path, relative: &str) -> Result<Option<Vec<u8>>> {
    let full_path = root.join(relative);
    let metadata = match fs::metadata(&full_path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Filesystem {
                message: format!("Failed to inspect '{}': {}", full_path.display(), e),
            })
        }
    };
    if !metadata.is_file() {
        return Err(Error::Filesystem {
            message: format!(
                "'{}' exists but is not a regular file",
                full_path.display()
            ),
        });
    }
    match fs::read(&full_path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Filesystem {
            message: format!("Failed to read '{}': {}", full_path.display(), e),
        }),
    }
}

/// Check that `root/relative` can be replaced by a regular file: no ancestor
/// is a non-directory and the target itself is not a directory.
pub fn check_writable(root: &Path, relative: &str) -> Result<()> {
    let full_path = root.join(relative);
    for ancestor in Path::new(relative).ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        let dir = root.join(ancestor);
        if let Ok(metadata) = fs::metadata(&dir) {
            if !metadata.is_dir() {
                return Err(Error::Filesystem {
                    message: format!(
                        "Cannot write '{}': '{}' is not a directory",
                        full_path.display(),
                        dir.display()
                    ),
                });
            }
        }
    }
    match fs::metadata(&full_path) {
        Ok(metadata) if metadata.is_dir() => Err(Error::Filesystem {
            message: format!("Cannot write '{}': it is a directory", full_path.display()),
        }),
        _ => Ok(()),
    }
}

/// Replace `path` with `content` without leaving a partially written file.
///
/// Writes a temporary file next to the target and renames it into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
        message: format!("Failed to create directory '{}': {}", parent.display(), e),
    })?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| Error::Filesystem {
        message: format!(
            "Failed to create temporary file in '{}': {}",
            parent.display(),
            e
        ),
    })?;
    temp.write_all(content).map_err(|e| Error::Filesystem {
        message: format!("Failed to write '{}': {}", path.display(), e),
    })?;
    temp.persist(path).map_err(|e| Error::Filesystem {
        message: format!("Failed to replace '{}': {}", path.display(), e.error),
    })?;
    Ok(())
}

/// Delete `root/relative` if it exists.
pub fn remove_if_exists(root: &Path, relative: &str) -> Result<()> {
    let full_path = root.join(relative);
    match fs::remove_file(&full_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Filesystem {
            message: format!("Failed to delete '{}': {}", full_path.display(), e),
        }),
    }
}
