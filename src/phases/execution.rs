//! Phase 3: Execution
//!
//! This is the third phase of the gensync execution pipeline. It builds every
//! generator instance in dependency order and collects the run's virtual
//! output tree.
//!
//! ## Process
//!
//! 1.  **Levels**: Instances run level by level on a bounded rayon pool. An
//!     instance starts only after every instance it depends on has finished
//!     and published its exports; instances within a level run in parallel.
//!     The export table is only written between levels.
//!
//! 2.  **Failure isolation**: A failed build marks its instance failed. Every
//!     instance that depends on a failed or skipped instance is skipped,
//!     with the dependency chain leading to the failure. Independent
//!     instances keep building so one run surfaces every failure.
//!
//! 3.  **Export checking**: An instance that declared an export but did not
//!     publish a value for it has failed.
//!
//! 4.  **Output collection**: Output files of built instances are rendered
//!     and gathered in execution order. A path produced twice is a fatal
//!     collision.
//!
//! Cancellation is checked before each level and before each instance. A
//! cancelled run returns `Error::Cancelled`; in-flight builds are allowed to
//! finish but their results are discarded.

use std::collections::HashMap;

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use super::{ExecutionOrder, GeneratedFile, GeneratorGraph, InstanceId, OutputTree};
use crate::cancel::CancellationToken;
use crate::error::{BuildFailure, Error, FailureKind, Result};
use crate::generator::{BuildContext, ProviderValue, ResolvedValues};
use crate::merge;
use crate::report::{InstanceReport, InstanceStatus};

/// What Phase 3 produced
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub tree: OutputTree,
    /// Every instance, in execution order.
    pub instances: Vec<InstanceReport>,
    /// Failed and skipped instances, in execution order.
    pub failures: Vec<BuildFailure>,
}

impl ExecutionResult {
    /// Identities of instances that failed or were skipped.
    pub fn unbuilt(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.instance.as_str())
    }
}

#[derive(Debug, Clone)]
enum State {
    Pending,
    Built,
    Failed,
    /// Skipped because dependency `via` failed or was skipped.
    Skipped { via: InstanceId },
}

enum BuildOutcome {
    Built {
        exports: HashMap<u64, ProviderValue>,
        files: Vec<GeneratedFile>,
    },
    Failed(String),
    Cancelled,
}

/// Execute Phase 3 on `pool`
pub fn execute(
    graph: &GeneratorGraph,
    order: &ExecutionOrder,
    pool: &ThreadPool,
    cancel: &CancellationToken,
) -> Result<ExecutionResult> {
    let mut states = vec![State::Pending; graph.len()];
    let mut exports: Vec<HashMap<u64, ProviderValue>> = vec![HashMap::new(); graph.len()];
    let mut files: Vec<Vec<GeneratedFile>> = vec![Vec::new(); graph.len()];
    let mut messages: HashMap<InstanceId, String> = HashMap::new();

    for (depth, level) in order.levels.iter().enumerate() {
        cancel.check()?;

        let mut runnable = Vec::with_capacity(level.len());
        for &id in level {
            let blocked = graph
                .dependencies_of(id)
                .into_iter()
                .find(|&dep| matches!(states[dep], State::Failed | State::Skipped { .. }));
            match blocked {
                Some(via) => {
                    debug!(
                        "Skipping '{}': dependency '{}' did not build",
                        graph.identity(id),
                        graph.identity(via)
                    );
                    states[id] = State::Skipped { via };
                }
                None => runnable.push(id),
            }
        }

        debug!("Building level {} ({} instances)", depth, runnable.len());
        let exports_ref = &exports;
        let outcomes: Vec<(InstanceId, BuildOutcome)> = pool.install(|| {
            runnable
                .par_iter()
                .map(|&id| (id, build_instance(graph, id, exports_ref, cancel)))
                .collect()
        });

        for (id, outcome) in outcomes {
            match outcome {
                BuildOutcome::Built {
                    exports: published,
                    files: produced,
                } => {
                    exports[id] = published;
                    files[id] = produced;
                    states[id] = State::Built;
                }
                BuildOutcome::Failed(message) => {
                    warn!("Generator '{}' failed: {}", graph.identity(id), message);
                    messages.insert(id, message);
                    states[id] = State::Failed;
                }
                BuildOutcome::Cancelled => return Err(Error::Cancelled),
            }
        }
    }

    let mut result = ExecutionResult::default();
    for &id in &order.order {
        let identity = graph.identity(id).to_string();
        let status = match &states[id] {
            State::Built | State::Pending => InstanceStatus::Built,
            State::Failed => {
                result.failures.push(BuildFailure {
                    instance: identity.clone(),
                    chain: graph.ancestor_chain(id),
                    kind: FailureKind::Failed {
                        message: messages.remove(&id).unwrap_or_default(),
                    },
                });
                InstanceStatus::Failed
            }
            State::Skipped { .. } => {
                let (chain, upstream) = skip_chain(graph, &states, id);
                result.failures.push(BuildFailure {
                    instance: identity.clone(),
                    chain,
                    kind: FailureKind::Skipped { upstream },
                });
                InstanceStatus::Skipped
            }
        };
        result.instances.push(InstanceReport { identity, status });

        for file in std::mem::take(&mut files[id]) {
            if let Err(rejected) = result.tree.insert(file) {
                let first = result
                    .tree
                    .get(&rejected.path)
                    .map(|f| f.generator.clone())
                    .unwrap_or_default();
                return Err(Error::OutputPathCollision {
                    path: rejected.path,
                    first,
                    second: rejected.generator,
                });
            }
        }
    }

    info!(
        "Built {} of {} generator instances, {} output files",
        result
            .instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Built)
            .count(),
        graph.len(),
        result.tree.len()
    );
    Ok(result)
}

/// Dependency chain from a skipped instance to the failure behind it, and
/// the failed instance's identity.
fn skip_chain(graph: &GeneratorGraph, states: &[State], id: InstanceId) -> (Vec<String>, String) {
    let mut chain = vec![graph.identity(id).to_string()];
    let mut current = id;
    while let State::Skipped { via } = states[current] {
        chain.push(graph.identity(via).to_string());
        current = via;
    }
    (chain, graph.identity(current).to_string())
}

fn build_instance(
    graph: &GeneratorGraph,
    id: InstanceId,
    exports: &[HashMap<u64, ProviderValue>],
    cancel: &CancellationToken,
) -> BuildOutcome {
    if cancel.is_cancelled() {
        return BuildOutcome::Cancelled;
    }
    let instance = &graph.instances[id];

    let resolved = instance
        .dependencies
        .iter()
        .zip(&instance.resolved)
        .map(|(dependency, exporters)| ResolvedValues {
            dependency: dependency.clone(),
            values: exporters
                .iter()
                .filter_map(|&exporter| exports[exporter].get(&dependency.provider().id()).cloned())
                .collect(),
        })
        .collect();

    let mut ctx = BuildContext::new(&instance.identity, resolved, &instance.exports);
    if let Err(e) = instance.generator.build(&mut ctx) {
        return BuildOutcome::Failed(e.to_string());
    }

    if let Some(missing) = instance
        .exports
        .iter()
        .find(|e| !ctx.exports.contains_key(&e.provider().id()))
    {
        return BuildOutcome::Failed(
            Error::MissingExport {
                instance: instance.identity.clone(),
                provider: missing.provider().name().to_string(),
            }
            .to_string(),
        );
    }

    let mut rendered = Vec::with_capacity(ctx.files.len());
    for file in ctx.files {
        let content = match merge::render(file.strategy.resolve(&file.path), &file.content) {
            Ok(content) => content,
            Err(e) => return BuildOutcome::Failed(format!("failed to render '{}': {}", file.path, e)),
        };
        rendered.push(GeneratedFile {
            path: file.path,
            content,
            strategy: file.strategy,
            options: file.options,
            generator: instance.identity.clone(),
        });
    }

    BuildOutcome::Built {
        exports: ctx.exports,
        files: rendered,
    }
}
