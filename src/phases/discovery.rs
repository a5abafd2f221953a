//! Phase 1: Discovery
//!
//! This is the first phase of the gensync execution pipeline. It turns a root
//! generator into a [`GeneratorGraph`]: every instance in the instantiation
//! tree, and for every declared dependency the exporters it resolves to.
//!
//! ## Process
//!
//! 1.  **Instantiation (`instantiate`)**: Starting at the root, each
//!     generator's `define` is called to collect its dependencies, exports,
//!     opened scopes and children. Children are instantiated depth-first in
//!     declaration order, so instance ids follow preorder. An instance's
//!     identity is its path in the tree (`app/server/routes`); two siblings
//!     with the same name are rejected.
//!
//! 2.  **Export registration (`register_exports`)**: Every export is placed
//!     at a visibility root. An unscoped export is visible in the subtree of
//!     the exporter's parent, i.e. to its siblings, their descendants and the
//!     parent itself. An export into a named scope is visible in the subtree
//!     of the nearest ancestor (the exporter included) that opened the scope.
//!     An exclusive provider may be exported at most once per visibility root.
//!
//! 3.  **Resolution (`resolve_dependencies`)**: For each dependency the
//!     consumer's ancestor chain is searched outward, starting at the consumer
//!     itself. Exclusive and keyed dependencies take the nearest level with a
//!     match and require exactly one exporter there. Read-only dependencies
//!     collect matches from every level, nearest first and in declaration order
//!     within a level. An instance never resolves to its own export.
//!
//! Nothing is built in this phase; a malformed graph fails here before any
//! generator code beyond `define` has run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;

use super::{DependencyEdge, GeneratorGraph, GeneratorInstance, InstanceId};
use crate::defaults::MAX_INSTANCE_DEPTH;
use crate::error::{Error, Result};
use crate::generator::{Definition, Generator};
use crate::provider::ProviderMode;

/// An export placed at its visibility root.
#[derive(Debug, Clone)]
struct RegisteredExport {
    exporter: InstanceId,
    key: Option<String>,
}

/// Exports by (visibility root, provider id), in registration order.
type Registry = HashMap<(InstanceId, u64), Vec<RegisteredExport>>;

/// Executes Phase 1 of the pipeline.
pub fn execute(root_name: &str, root: Arc<dyn Generator>) -> Result<GeneratorGraph> {
    let mut graph = GeneratorGraph::default();
    instantiate(&mut graph, root_name, root, None, 0)?;
    let registry = register_exports(&graph)?;
    resolve_dependencies(&mut graph, &registry)?;
    debug!(
        "Discovered {} generator instances with {} dependency edges",
        graph.len(),
        graph.edges.len()
    );
    Ok(graph)
}

fn validate_name(name: &str, parent_identity: Option<&str>) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::Config {
            message: format!(
                "Invalid generator instance name '{}'{}",
                name,
                parent_identity
                    .map(|p| format!(" under '{}'", p))
                    .unwrap_or_default()
            ),
            hint: Some("Instance names must be non-empty and must not contain '/'".to_string()),
        });
    }
    Ok(())
}

/// Depth-first instantiation; returns the new instance's id.
fn instantiate(
    graph: &mut GeneratorGraph,
    name: &str,
    generator: Arc<dyn Generator>,
    parent: Option<InstanceId>,
    depth: usize,
) -> Result<InstanceId> {
    let parent_identity = parent.map(|p| graph.identity(p).to_string());
    validate_name(name, parent_identity.as_deref())?;
    let identity = match &parent_identity {
        Some(p) => format!("{}/{}", p, name),
        None => name.to_string(),
    };

    if depth > MAX_INSTANCE_DEPTH {
        return Err(Error::Config {
            message: format!(
                "Generator tree is deeper than {} levels at '{}'",
                MAX_INSTANCE_DEPTH, identity
            ),
            hint: Some("A generator probably mounts itself as a child".to_string()),
        });
    }

    let mut definition = Definition::new();
    generator.define(&mut definition);
    let Definition {
        dependencies,
        exports,
        scopes,
        children,
    } = definition;

    let id = graph.instances.len();
    graph.instances.push(GeneratorInstance {
        id,
        identity: identity.clone(),
        parent,
        children: Vec::new(),
        resolved: Vec::new(),
        dependencies,
        exports,
        scopes,
        generator,
    });

    let mut seen = HashSet::new();
    for (child_name, child) in children {
        if !seen.insert(child_name.clone()) {
            return Err(Error::DuplicateInstance {
                identity: format!("{}/{}", identity, child_name),
            });
        }
        let child_id = instantiate(graph, &child_name, child, Some(id), depth + 1)?;
        graph.instances[id].children.push(child_id);
    }

    Ok(id)
}

/// The instance whose subtree sees export `index` of `exporter`.
fn visibility_root(graph: &GeneratorGraph, exporter: InstanceId, index: usize) -> Result<InstanceId> {
    let instance = &graph.instances[exporter];
    let export = &instance.exports[index];
    let scope = match &export.scope {
        None => return Ok(instance.parent.unwrap_or(exporter)),
        Some(scope) => scope,
    };

    let mut current = Some(exporter);
    while let Some(id) = current {
        let candidate = &graph.instances[id];
        if candidate.scopes.contains(scope) {
            return Ok(id);
        }
        current = candidate.parent;
    }

    Err(Error::UnknownScope {
        instance: instance.identity.clone(),
        provider: export.provider.name().to_string(),
        scope: scope.name().to_string(),
    })
}

fn register_exports(graph: &GeneratorGraph) -> Result<Registry> {
    let mut registry: Registry = HashMap::new();

    for instance in &graph.instances {
        for (index, export) in instance.exports.iter().enumerate() {
            let root = visibility_root(graph, instance.id, index)?;
            let entries = registry.entry((root, export.provider.id())).or_default();

            if export.provider.mode() == ProviderMode::Exclusive {
                if let Some(existing) = entries.iter().find(|e| e.key == export.key) {
                    return Err(Error::AmbiguousExport {
                        provider: export.provider.name().to_string(),
                        scope_owner: graph.identity(root).to_string(),
                        first: graph.identity(existing.exporter).to_string(),
                        second: instance.identity.clone(),
                    });
                }
            }

            entries.push(RegisteredExport {
                exporter: instance.id,
                key: export.key.clone(),
            });
        }
    }

    Ok(registry)
}

fn resolve_dependencies(graph: &mut GeneratorGraph, registry: &Registry) -> Result<()> {
    let mut all_resolved = Vec::with_capacity(graph.instances.len());
    let mut edges = Vec::new();

    for consumer in &graph.instances {
        let mut resolved = Vec::with_capacity(consumer.dependencies.len());

        for dependency in &consumer.dependencies {
            let provider = dependency.provider();
            let mut found: Vec<InstanceId> = Vec::new();

            let mut level = Some(consumer.id);
            while let Some(root) = level {
                let matches: Vec<InstanceId> = registry
                    .get(&(root, provider.id()))
                    .map(|entries| {
                        entries
                            .iter()
                            .filter(|e| e.exporter != consumer.id)
                            .filter(|e| dependency.key().is_none() || e.key.as_deref() == dependency.key())
                            .map(|e| e.exporter)
                            .collect()
                    })
                    .unwrap_or_default();

                if dependency.is_single() && !matches.is_empty() {
                    if matches.len() > 1 {
                        return Err(Error::AmbiguousDependency {
                            instance: consumer.identity.clone(),
                            provider: provider.name().to_string(),
                            candidates: matches
                                .iter()
                                .map(|&id| graph.identity(id).to_string())
                                .collect(),
                        });
                    }
                    found = matches;
                    break;
                }
                found.extend(matches);
                level = graph.instances[root].parent;
            }

            if found.is_empty() && !dependency.is_optional() {
                return Err(Error::UnresolvedDependency {
                    instance: consumer.identity.clone(),
                    provider: provider.name().to_string(),
                });
            }

            for &exporter in &found {
                edges.push(DependencyEdge {
                    consumer: consumer.id,
                    provider: provider.clone(),
                    exporter,
                });
            }
            resolved.push(found);
        }

        all_resolved.push(resolved);
    }

    for (instance, resolved) in graph.instances.iter_mut().zip(all_resolved) {
        instance.resolved = resolved;
    }
    graph.edges = edges;
    Ok(())
}
