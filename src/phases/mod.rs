//! Implementation of the phases of a gensync run.
//!
//! ## Overview
//!
//! A run follows 5 phases:
//! 1. Discovery - Instantiate the generator tree and resolve every declared
//!    dependency to its exporters
//! 2. Ordering - Reject dependency cycles and compute a stable topological order
//! 3. Execution - Build instances level by level on a worker pool, collecting
//!    exports and output files
//! 4. Reconciliation - Three-way merge each output path against its baseline and
//!    the file on disk, staging every write
//! 5. Writing - Commit staged writes and deletions, then save the new baseline
//!
//! Phases 1 and 2 are pure: a malformed graph fails before any generator builds
//! and long before anything touches the disk. Phase 5 is the only phase that
//! writes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::generator::{Dependency, Export, FileOptions, Generator};
use crate::merge::MergeStrategy;
use crate::provider::{ExportScope, ProviderKey};

// Phase modules
pub mod discovery;
pub mod execution;
pub mod orchestrator;
pub mod ordering;
pub mod reconcile;
pub mod write;

pub use discovery as phase1;
pub use execution as phase3;
pub use ordering as phase2;
pub use reconcile as phase4;
pub use write as phase5;

/// Index of an instance in [`GeneratorGraph::instances`], assigned in
/// depth-first preorder (declaration order).
pub type InstanceId = usize;

/// One configured invocation of a generator
pub struct GeneratorInstance {
    pub id: InstanceId,
    /// Path in the instantiation tree, e.g. `app/server/routes`.
    pub identity: String,
    pub parent: Option<InstanceId>,
    pub children: Vec<InstanceId>,
    pub dependencies: Vec<Dependency>,
    /// Exporters resolved for each entry of `dependencies`, nearest first.
    pub resolved: Vec<Vec<InstanceId>>,
    pub exports: Vec<Export>,
    /// Scopes this instance opened for its subtree.
    pub scopes: Vec<ExportScope>,
    pub(crate) generator: Arc<dyn Generator>,
}

impl std::fmt::Debug for GeneratorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorInstance")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

/// (consumer, provider) resolved to one exporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub consumer: InstanceId,
    pub provider: ProviderKey,
    pub exporter: InstanceId,
}

/// Instances plus resolved dependency edges
#[derive(Debug, Default)]
pub struct GeneratorGraph {
    /// All instances in preorder; index 0 is the root.
    pub instances: Vec<GeneratorInstance>,
    pub edges: Vec<DependencyEdge>,
}

impl GeneratorGraph {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, id: InstanceId) -> Option<&GeneratorInstance> {
        self.instances.get(id)
    }

    /// Look an instance up by identity.
    pub fn find(&self, identity: &str) -> Option<&GeneratorInstance> {
        self.instances.iter().find(|i| i.identity == identity)
    }

    pub fn identity(&self, id: InstanceId) -> &str {
        self.instances
            .get(id)
            .map(|i| i.identity.as_str())
            .unwrap_or("<unknown>")
    }

    /// Distinct instances `id` depends on, ascending.
    pub fn dependencies_of(&self, id: InstanceId) -> Vec<InstanceId> {
        let set: BTreeSet<InstanceId> = self
            .instances
            .get(id)
            .map(|i| i.resolved.iter().flatten().copied().collect())
            .unwrap_or_default();
        set.into_iter().collect()
    }

    /// Reverse adjacency: for each instance, the instances depending on it.
    pub fn dependents(&self) -> Vec<Vec<InstanceId>> {
        let mut dependents = vec![Vec::new(); self.instances.len()];
        for id in 0..self.instances.len() {
            for dep in self.dependencies_of(id) {
                dependents[dep].push(id);
            }
        }
        dependents
    }

    /// Identities of the ancestors of `id`, root first.
    pub fn ancestor_chain(&self, id: InstanceId) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.instances.get(id).and_then(|i| i.parent);
        while let Some(parent) = current {
            chain.push(self.identity(parent).to_string());
            current = self.instances.get(parent).and_then(|i| i.parent);
        }
        chain.reverse();
        chain
    }
}

/// Stable execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOrder {
    /// Every instance, dependencies strictly before dependents.
    pub order: Vec<InstanceId>,
    /// Instances grouped by dependency depth; an instance only depends on
    /// instances in earlier levels.
    pub levels: Vec<Vec<InstanceId>>,
}

impl ExecutionOrder {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Position of `id` in `order`.
    pub fn position(&self, id: InstanceId) -> Option<usize> {
        self.order.iter().position(|&i| i == id)
    }
}

/// A rendered output file with its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    /// Rendered text, exactly what a clean write puts on disk.
    pub content: String,
    /// As declared by the generator; configuration may still override it.
    pub strategy: MergeStrategy,
    pub options: FileOptions,
    /// Identity of the producing instance.
    pub generator: String,
}

/// The virtual output tree of a run, keyed by path
#[derive(Debug, Clone, Default)]
pub struct OutputTree {
    files: BTreeMap<String, GeneratedFile>,
}

impl OutputTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Insert `file`, handing it back if its path is already taken.
    pub fn insert(&mut self, file: GeneratedFile) -> std::result::Result<(), GeneratedFile> {
        if self.files.contains_key(&file.path) {
            return Err(file);
        }
        self.files.insert(file.path.clone(), file);
        Ok(())
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
