//! Provider types and export scopes
//!
//! Generators communicate through *providers*: typed capability keys that one
//! generator exports and others depend on. A provider type is an opaque token
//! allocated once; two tokens are equal only if they came from the same
//! constructor call, so names are purely for diagnostics and may repeat.
//!
//! - [`ProviderType::exclusive`] creates a single-owner provider: exactly one
//!   generator in a visibility scope may export it.
//! - [`ProviderType::read_only`] creates a broadcast provider: any number of
//!   generators may export it and consumers receive every reachable export.
//! - [`ExportScope::new`] creates a named visibility boundary that a generator
//!   opens for its subtree.
//!
//! None of these touch global state beyond allocating a fresh token id.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// How exports of a provider type are resolved for consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderMode {
    /// One exporter per scope; consumers receive that single value.
    Exclusive,
    /// Many exporters; consumers receive the aggregated set.
    ReadOnly,
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderMode::Exclusive => write!(f, "exclusive"),
            ProviderMode::ReadOnly => write!(f, "read-only"),
        }
    }
}

/// Untyped identity of a provider type, as seen by the dependency graph.
#[derive(Debug, Clone)]
pub struct ProviderKey {
    id: u64,
    name: Arc<str>,
    mode: ProviderMode,
}

impl ProviderKey {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ProviderMode {
        self.mode
    }
}

impl PartialEq for ProviderKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ProviderKey {}

impl Hash for ProviderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A typed provider handle.
///
/// `T` is the value type exporters publish and consumers receive. Exclusive
/// providers that accept contributions from consumers should wrap their
/// mutable state in a lock (e.g. `Mutex<Vec<String>>`) since the value is
/// shared behind an `Arc`.
pub struct ProviderType<T> {
    key: ProviderKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ProviderType<T> {
    /// Create a single-owner provider type.
    pub fn exclusive(name: &str) -> Self {
        Self::with_mode(name, ProviderMode::Exclusive)
    }

    /// Create a broadcast provider type.
    pub fn read_only(name: &str) -> Self {
        Self::with_mode(name, ProviderMode::ReadOnly)
    }

    fn with_mode(name: &str, mode: ProviderMode) -> Self {
        Self {
            key: ProviderKey {
                id: next_token(),
                name: Arc::from(name),
                mode,
            },
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &ProviderKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn mode(&self) -> ProviderMode {
        self.key.mode
    }
}

impl<T> Clone for ProviderType<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ProviderType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderType")
            .field("name", &self.key.name)
            .field("mode", &self.key.mode)
            .finish()
    }
}

impl<T> PartialEq for ProviderType<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for ProviderType<T> {}

/// A named visibility boundary for exports.
///
/// A generator opens a scope for its subtree; descendants exporting into that
/// scope are visible to every instance under the opener and nowhere else.
#[derive(Debug, Clone)]
pub struct ExportScope {
    id: u64,
    name: Arc<str>,
}

impl ExportScope {
    pub fn new(name: &str) -> Self {
        Self {
            id: next_token(),
            name: Arc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ExportScope {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExportScope {}

impl Hash for ExportScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
