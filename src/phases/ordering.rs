//! Phase 2: Determining Execution Order
//!
//! This is the second phase of the gensync execution pipeline. Its main
//! responsibility is to determine the order in which generator instances are
//! built, so that every instance builds after all the instances it depends on.
//!
//! ## Process
//!
//! 1.  **Cycle Detection (`detect_cycle`)**: A depth-first traversal over the
//!     dependency edges keeps the current path on a recursion stack. Reaching
//!     an instance that is still on the stack means the edges contain a cycle,
//!     reported as the chain of identities from that instance back to itself.
//!
//! 2.  **Topological Sort (`topological_order`)**: Kahn's algorithm, always
//!     taking the ready instance with the lowest preorder id. Ties between
//!     independent instances therefore follow declaration order, and the
//!     order is identical from run to run.
//!
//! 3.  **Levels (`levels`)**: Each instance is assigned one more than the
//!     highest level of its dependencies. Instances on the same level do not
//!     depend on each other and may build concurrently.

use std::collections::BTreeSet;

use super::{ExecutionOrder, GeneratorGraph, InstanceId};
use crate::error::{Error, Result};

/// Execute Phase 2: compute a stable execution order
pub fn execute(graph: &GeneratorGraph) -> Result<ExecutionOrder> {
    detect_cycle(graph)?;
    let order = topological_order(graph)?;
    let levels = levels(graph, &order);
    Ok(ExecutionOrder { order, levels })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Fail with `CyclicDependency` if the dependency edges contain a cycle.
pub fn detect_cycle(graph: &GeneratorGraph) -> Result<()> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut stack = Vec::new();

    for start in 0..graph.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(cycle) = visit(graph, start, &mut marks, &mut stack) {
                return Err(Error::CyclicDependency {
                    cycle: cycle
                        .into_iter()
                        .map(|id| graph.identity(id).to_string())
                        .collect(),
                });
            }
        }
    }
    Ok(())
}

fn visit(
    graph: &GeneratorGraph,
    node: InstanceId,
    marks: &mut [Mark],
    stack: &mut Vec<InstanceId>,
) -> Option<Vec<InstanceId>> {
    marks[node] = Mark::OnStack;
    stack.push(node);

    for next in graph.dependencies_of(node) {
        match marks[next] {
            Mark::OnStack => {
                let pos = stack.iter().position(|&id| id == next).unwrap_or(0);
                let mut cycle = stack[pos..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            Mark::Unvisited => {
                if let Some(cycle) = visit(graph, next, marks, stack) {
                    return Some(cycle);
                }
            }
            Mark::Done => {}
        }
    }

    stack.pop();
    marks[node] = Mark::Done;
    None
}

/// Dependencies-first order with ties broken by preorder id.
pub fn topological_order(graph: &GeneratorGraph) -> Result<Vec<InstanceId>> {
    let dependents = graph.dependents();
    let mut remaining: Vec<usize> = (0..graph.len())
        .map(|id| graph.dependencies_of(id).len())
        .collect();
    let mut ready: BTreeSet<InstanceId> = remaining
        .iter()
        .enumerate()
        .filter(|(_, &n)| n == 0)
        .map(|(id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(id) = ready.pop_first() {
        order.push(id);
        for &dependent in &dependents[id] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != graph.len() {
        // Only reachable when `detect_cycle` was skipped.
        let stuck = (0..graph.len())
            .filter(|id| remaining[*id] > 0)
            .map(|id| graph.identity(id).to_string())
            .collect();
        return Err(Error::CyclicDependency { cycle: stuck });
    }
    Ok(order)
}

/// Group `order` into dependency levels.
pub fn levels(graph: &GeneratorGraph, order: &[InstanceId]) -> Vec<Vec<InstanceId>> {
    let mut level_of = vec![0usize; graph.len()];
    let mut levels: Vec<Vec<InstanceId>> = Vec::new();

    for &id in order {
        let level = graph
            .dependencies_of(id)
            .iter()
            .map(|&dep| level_of[dep] + 1)
            .max()
            .unwrap_or(0);
        level_of[id] = level;
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(id);
    }

    for level in &mut levels {
        level.sort_unstable();
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::testing::FnGenerator;
    use crate::generator::Definition;
    use crate::phases::discovery;
    use crate::provider::ProviderType;
    use std::sync::Arc;

    /// Build a flat graph: `app` with children named by `names`; `wire`
    /// declares exports and dependencies per child.
    fn flat_graph(
        names: &'static [&'static str],
        wire: impl Fn(&str, &mut Definition) + Send + Sync + Clone + 'static,
    ) -> Result<GeneratorGraph> {
        discovery::execute(
            "app",
            Arc::new(FnGenerator::define_only(move |d| {
                for name in names {
                    let wire = wire.clone();
                    d.child(name, FnGenerator::define_only(move |d| wire(name, d)));
                }
            })),
        )
    }

    #[test]
    fn test_dependencies_come_first() {
        let a: ProviderType<u8> = ProviderType::exclusive("a");
        let b: ProviderType<u8> = ProviderType::exclusive("b");
        // first depends on second, second depends on third.
        let graph = flat_graph(&["first", "second", "third"], move |name, d| match name {
            "first" => {
                d.depends_on(&a);
            }
            "second" => {
                d.exports(&a).depends_on(&b);
            }
            _ => {
                d.exports(&b);
            }
        })
        .unwrap();

        let order = execute(&graph).unwrap();
        let identities: Vec<&str> = order.order.iter().map(|&id| graph.identity(id)).collect();
        assert_eq!(identities, vec!["app", "app/third", "app/second", "app/first"]);
        assert_eq!(order.levels, vec![vec![0, 3], vec![2], vec![1]]);

        for edge in &graph.edges {
            assert!(order.position(edge.exporter) < order.position(edge.consumer));
        }
    }

    #[test]
    fn test_independent_instances_keep_declaration_order() {
        let graph = flat_graph(&["c", "a", "b"], |_, _| {}).unwrap();
        let order = execute(&graph).unwrap();
        assert_eq!(order.order, vec![0, 1, 2, 3]);
        assert_eq!(order.levels, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_cycle_is_reported_with_chain() {
        let a: ProviderType<u8> = ProviderType::exclusive("a");
        let b: ProviderType<u8> = ProviderType::exclusive("b");
        let graph = flat_graph(&["x", "y"], move |name, d| {
            if name == "x" {
                d.exports(&a).depends_on(&b);
            } else {
                d.exports(&b).depends_on(&a);
            }
        })
        .unwrap();

        match execute(&graph).unwrap_err() {
            Error::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec!["app/x", "app/y", "app/x"]);
            }
            other => panic!("expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_three_node_cycle_names_exact_chain() {
        let p: ProviderType<u8> = ProviderType::exclusive("p");
        let q: ProviderType<u8> = ProviderType::exclusive("q");
        let r: ProviderType<u8> = ProviderType::exclusive("r");
        let graph = flat_graph(&["standalone", "a", "b", "c"], move |name, d| match name {
            "a" => {
                d.exports(&p).depends_on(&q);
            }
            "b" => {
                d.exports(&q).depends_on(&r);
            }
            "c" => {
                d.exports(&r).depends_on(&p);
            }
            _ => {}
        })
        .unwrap();

        let err = execute(&graph).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cyclic dependency between generators: app/a -> app/b -> app/c -> app/a"
        );
    }
}
