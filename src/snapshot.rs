//! Baseline snapshot store
//!
//! The snapshot records, per output path, the exact generated content of the
//! last committed run together with its SHA-256 hash and the identity of the
//! generator instance that produced it. The next run uses it as the common
//! ancestor of its three-way merges.
//!
//! ## Format
//!
//! A single JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "src/main.rs": { "hash": "…", "content": "…", "generator": "app/server" }
//!   }
//! }
//! ```
//!
//! A document with a different `version`, an entry whose hash does not
//! match its content, an entry path that is not a normalized relative path
//! inside the managed root, or anything that does not parse is reported as
//! `Error::SnapshotCorrupt`. Callers that want the recoverable behavior use
//! [`SnapshotStore::load_or_degrade`], which logs the problem and proceeds as
//! if no baseline existed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::filesystem::write_atomic;
use crate::path::normalize_output_path;
use crate::report::Issue;

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Hex-encoded SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Baseline content of one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub hash: String,
    pub content: String,
    /// Identity of the instance that generated this path.
    pub generator: String,
}

impl SnapshotEntry {
    pub fn new(content: impl Into<String>, generator: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            hash: content_hash(content.as_bytes()),
            content,
            generator: generator.into(),
        }
    }

    /// Whether the stored hash matches the stored content.
    pub fn verify(&self) -> bool {
        self.hash == content_hash(self.content.as_bytes())
    }

    /// Fast equality against other bytes via the stored hash.
    pub fn matches(&self, content: &[u8]) -> bool {
        self.hash == content_hash(content)
    }
}

/// The persisted baseline: output path to entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub entries: BTreeMap<String, SnapshotEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&SnapshotEntry> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: SnapshotEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads and writes the snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, message: impl Into<String>) -> Error {
        Error::SnapshotCorrupt {
            path: self.path.display().to_string(),
            message: message.into(),
        }
    }

    /// Load the snapshot. `Ok(None)` when no snapshot has been written yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(e.to_string())),
        };

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| self.corrupt(e.to_string()))?;
        let version = value.get("version").and_then(|v| v.as_u64());
        if version != Some(u64::from(SNAPSHOT_VERSION)) {
            return Err(self.corrupt(format!(
                "unsupported snapshot version {} (expected {})",
                version.map_or_else(|| "<missing>".to_string(), |v| v.to_string()),
                SNAPSHOT_VERSION
            )));
        }

        let snapshot: Snapshot =
            serde_json::from_value(value).map_err(|e| self.corrupt(e.to_string()))?;
        if let Some((path, _)) = snapshot.entries.iter().find(|(_, entry)| !entry.verify()) {
            return Err(self.corrupt(format!("hash mismatch for '{}'", path)));
        }
        for path in snapshot.paths() {
            match normalize_output_path(path) {
                Ok(normalized) if normalized == *path => {}
                _ => {
                    return Err(self.corrupt(format!(
                        "entry path '{}' is not a normalized path inside the managed root",
                        path
                    )))
                }
            }
        }

        debug!(
            "Loaded snapshot with {} entries from {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(Some(snapshot))
    }

    /// Load the snapshot, treating corruption as "no baseline".
    ///
    /// The returned issue, if any, belongs on the run report.
    pub fn load_or_degrade(&self) -> (Option<Snapshot>, Option<Issue>) {
        match self.load() {
            Ok(snapshot) => (snapshot, None),
            Err(e) => {
                warn!("{}; continuing without a baseline", e);
                let message = match e {
                    Error::SnapshotCorrupt { message, .. } => message,
                    other => other.to_string(),
                };
                (None, Some(Issue::SnapshotCorrupt { message }))
            }
        }
    }

    /// Persist `snapshot`, replacing any previous file atomically.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut json = serde_json::to_string_pretty(snapshot).map_err(|e| {
            Error::Serialization {
                message: format!("Failed to serialize snapshot: {}", e),
            }
        })?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())?;
        debug!(
            "Saved snapshot with {} entries to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}
